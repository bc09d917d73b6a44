//! 带缓存的存储包装
//!
//! [`CachedStore`] 包装任意 [`BackingStore`]，自身也实现 [`BackingStore`]：
//! 调用方在构造处选择是否经过缓存，接口与直接访问存储完全相同。
//!
//! - 未初始化缓存时，所有操作原样转发给被包装的存储
//! - 初始化后，读写按块拆分并经过缓存；打开时去掉与缓存冲突的标志；
//!   同步和关闭先写回该句柄的脏块；定位始终直接交给存储
//! - 每个句柄的打开方式都被记录：不可写的句柄不能写入缓存；
//!   缓存激活前以 `DIRECT` 或只写方式打开的句柄绕过缓存
//!
//! stream/io.rs 负责把一次读写拆分到各个块

mod io;

use alloc::collections::BTreeMap;
use core::hash::BuildHasher;
use core::num::NonZeroUsize;
use lru::DefaultHasher;

use crate::{
    cache::BlockCache,
    consts::DEFAULT_CACHE_SIZE,
    error::{Error, ErrorKind, Result},
    store::{end_offset, BackingStore},
    types::{Handle, OpenFlags, SeekFrom},
};

/// 带写回块缓存的存储
///
/// # 生命周期
///
/// 未激活 → `init` → 激活 → `destroy`（写回全部脏块后释放）→ 未激活。
/// 被丢弃时如果仍处于激活状态，会尽力写回全部脏块。
///
/// # 示例
///
/// ```rust,ignore
/// use blkcache::{BackingStore, CachedStore, FileStore, OpenFlags, SeekFrom};
///
/// let mut store = CachedStore::new(FileStore::new());
/// store.init(64)?;
///
/// let h = store.open("data.bin", OpenFlags::READ_WRITE | OpenFlags::CREATE, 0o644)?;
/// store.write(h, b"hello")?;
/// store.seek(h, SeekFrom::Start(0))?;
///
/// let mut buf = [0u8; 5];
/// store.read(h, &mut buf)?;
/// store.close(h)?;
///
/// store.destroy()?;
/// ```
pub struct CachedStore<B: BackingStore, S: BuildHasher = DefaultHasher> {
    /// 被包装的真实存储
    store: B,
    /// 块缓存（未初始化时为 None）
    cache: Option<BlockCache<S>>,
    /// 每次 `init` 使用的键哈希策略
    hasher: S,
    /// 打开中的句柄及存储实际收到的打开标志
    modes: BTreeMap<Handle, OpenFlags>,
}

impl<B: BackingStore> CachedStore<B> {
    /// 创建未激活的包装，使用默认键哈希策略
    pub fn new(store: B) -> Self {
        Self::with_hasher(store, DefaultHasher::default())
    }
}

impl<B: BackingStore, S: BuildHasher> CachedStore<B, S> {
    /// 创建未激活的包装，使用指定的键哈希策略
    pub fn with_hasher(store: B, hasher: S) -> Self {
        Self {
            store,
            cache: None,
            hasher,
            modes: BTreeMap::new(),
        }
    }

    /// 初始化缓存
    ///
    /// # 参数
    ///
    /// * `capacity` - 缓存容量（块数量），激活期间不可变
    ///
    /// # 错误
    ///
    /// 已经初始化或容量为 0 时返回 `Init` 错误
    ///
    /// # 注意
    ///
    /// 激活前打开的句柄如果带 `DIRECT` 或者只写，之后的读写绕过缓存直接交给存储，
    /// 其余句柄从此经过缓存
    pub fn init(&mut self, capacity: usize) -> Result<()>
    where
        S: Clone,
    {
        if self.cache.is_some() {
            log::warn!("[STREAM] cache already initialized");
            return Err(Error::new(ErrorKind::Init, "cache already initialized"));
        }
        let capacity = NonZeroUsize::new(capacity)
            .ok_or(Error::new(ErrorKind::Init, "cache capacity must be positive"))?;

        self.cache = Some(BlockCache::with_hasher(capacity, self.hasher.clone()));
        log::debug!("[STREAM] cache initialized with {} blocks", capacity);
        Ok(())
    }

    /// 使用默认容量 `DEFAULT_CACHE_SIZE` 初始化缓存
    pub fn init_default(&mut self) -> Result<()>
    where
        S: Clone,
    {
        self.init(DEFAULT_CACHE_SIZE)
    }

    /// 写回全部脏块并释放缓存
    ///
    /// 未激活时什么都不做。写回失败时缓存保持激活、失败的块保持为脏，
    /// 可以稍后再次调用。
    pub fn destroy(&mut self) -> Result<()> {
        let Some(cache) = self.cache.as_mut() else {
            return Ok(());
        };
        let flushed = cache.flush_all(&mut self.store)?;
        self.cache = None;
        log::debug!("[STREAM] cache destroyed ({} blocks flushed)", flushed);
        Ok(())
    }

    /// 缓存是否处于激活状态
    pub fn is_active(&self) -> bool {
        self.cache.is_some()
    }

    /// 当前缓存（用于查看统计和驻留情况）
    pub fn cache(&self) -> Option<&BlockCache<S>> {
        self.cache.as_ref()
    }

    /// 被包装的存储
    pub fn store(&self) -> &B {
        &self.store
    }

    /// 该句柄的读写是否经过缓存
    ///
    /// 未经本包装打开的句柄打开方式未知，一律直接交给存储
    fn caches(&self, handle: Handle) -> bool {
        self.cache.is_some()
            && self
                .modes
                .get(&handle)
                .is_some_and(|&flags| normalize_flags(flags) == flags)
    }
}

fn check_writable(modes: &BTreeMap<Handle, OpenFlags>, handle: Handle) -> Result<()> {
    match modes.get(&handle) {
        Some(flags) if flags.contains(OpenFlags::WRITE) => Ok(()),
        _ => Err(Error::new(ErrorKind::Store, "handle not open for writing")),
    }
}

/// 去掉与缓存冲突的打开标志
///
/// - `DIRECT`：缓存本身就是缓冲层
/// - 只写打开补上 `READ`：部分块写入需要先读出原有内容
fn normalize_flags(flags: OpenFlags) -> OpenFlags {
    let mut normalized = flags - OpenFlags::DIRECT;
    if normalized.contains(OpenFlags::WRITE) {
        normalized |= OpenFlags::READ;
    }
    normalized
}

impl<B: BackingStore, S: BuildHasher> BackingStore for CachedStore<B, S> {
    fn open(&mut self, path: &str, flags: OpenFlags, mode: u32) -> Result<Handle> {
        let flags = if self.cache.is_some() {
            let normalized = normalize_flags(flags);
            if normalized != flags {
                log::debug!("[STREAM] open {:?}: flags {:?} -> {:?}", path, flags, normalized);
            }
            normalized
        } else {
            flags
        };
        let handle = self.store.open(path, flags, mode)?;
        self.modes.insert(handle, flags);
        Ok(handle)
    }

    fn close(&mut self, handle: Handle) -> Result<()> {
        if let Some(cache) = self.cache.as_mut() {
            cache.flush_handle(handle, &mut self.store)?;
            cache.remove_handle(handle);
        }
        self.store.close(handle)?;
        self.modes.remove(&handle);
        Ok(())
    }

    fn read_at(&mut self, handle: Handle, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let cached = self.caches(handle);
        match self.cache.as_mut() {
            Some(cache) if cached => io::read_blocks(cache, &mut self.store, handle, offset, buf),
            _ => self.store.read_at(handle, offset, buf),
        }
    }

    fn write_at(&mut self, handle: Handle, offset: u64, buf: &[u8]) -> Result<usize> {
        let cached = self.caches(handle);
        match self.cache.as_mut() {
            Some(cache) if cached => {
                check_writable(&self.modes, handle)?;
                io::write_blocks(cache, &mut self.store, handle, offset, buf)
            }
            _ => self.store.write_at(handle, offset, buf),
        }
    }

    fn sync(&mut self, handle: Handle) -> Result<()> {
        if let Some(cache) = self.cache.as_mut() {
            cache.flush_handle(handle, &mut self.store)?;
        }
        self.store.sync(handle)
    }

    fn seek(&mut self, handle: Handle, pos: SeekFrom) -> Result<u64> {
        self.store.seek(handle, pos)
    }

    fn read(&mut self, handle: Handle, buf: &mut [u8]) -> Result<usize> {
        let cached = self.caches(handle);
        let Some(cache) = self.cache.as_mut().filter(|_| cached) else {
            return self.store.read(handle, buf);
        };
        let pos = self.store.position(handle)?;
        let n = io::read_blocks(cache, &mut self.store, handle, pos, buf)?;
        self.store.seek(handle, SeekFrom::Start(end_offset(pos, n)?))?;
        Ok(n)
    }

    fn write(&mut self, handle: Handle, buf: &[u8]) -> Result<usize> {
        let cached = self.caches(handle);
        let Some(cache) = self.cache.as_mut().filter(|_| cached) else {
            return self.store.write(handle, buf);
        };
        check_writable(&self.modes, handle)?;
        let pos = self.store.position(handle)?;
        let n = io::write_blocks(cache, &mut self.store, handle, pos, buf)?;
        self.store.seek(handle, SeekFrom::Start(end_offset(pos, n)?))?;
        Ok(n)
    }
}

impl<B: BackingStore, S: BuildHasher> Drop for CachedStore<B, S> {
    fn drop(&mut self) {
        if let Err(e) = self.destroy() {
            log::error!("[STREAM] dirty blocks lost on drop: {}", e);
        }
    }
}
