//! 块缓存实现（基于 lru crate）
//!
//! # 结构
//!
//! ```text
//! struct BlockCache<S> {
//!     blocks: LruCache<BlockKey, CachedBlock, S>,  // O(1) 查找/提升/驱逐
//!     dirty_set: BTreeSet<BlockKey>,               // 按 (handle, offset) 有序的脏块索引
//!     stats: CacheStats,
//! }
//! ```
//!
//! 块键是 `(handle, offset)`，所以同一句柄的脏块在 `dirty_set` 中是连续区间，
//! `flush_handle` 直接做范围查询。
//!
//! # 驱逐
//!
//! 严格 LRU，每次插入前至多驱逐一个块。脏块先写回再移除；写回失败时块保留在缓存中，
//! 脏标志不变，错误返回给触发这次加载的调用者。绝不丢弃未写回的数据。

use crate::{
    consts::{BLOCK_SIZE, DIRTY_WARN_RATIO},
    error::{Error, ErrorKind, Result},
    store::BackingStore,
    types::{BlockKey, Handle},
};

use super::buffer::CachedBlock;
use alloc::collections::BTreeSet;
use alloc::vec::Vec;
use core::hash::BuildHasher;
use core::num::NonZeroUsize;
use lru::{DefaultHasher, LruCache};

/// 缓存统计信息
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheStats {
    /// 总访问次数
    pub total_accesses: u64,
    /// 缓存命中次数
    pub hits: u64,
    /// 缓存未命中次数
    pub misses: u64,
    /// 从存储加载块的次数
    pub loads: u64,
    /// 驱逐次数
    pub evictions: u64,
    /// 脏块写回次数
    pub writebacks: u64,
    /// 当前脏块数量
    pub dirty_blocks: usize,
}

impl CacheStats {
    /// 计算命中率
    pub fn hit_rate(&self) -> f64 {
        if self.total_accesses == 0 {
            0.0
        } else {
            self.hits as f64 / self.total_accesses as f64
        }
    }
}

/// 块缓存
///
/// 对键哈希策略 `S` 泛型，默认使用 lru crate 的哈希器；
/// 需要确定性哈希时可以使用 [`MixState`](super::MixState)。
///
/// 所有会触发 I/O 的方法都接收后备存储的可变引用，缓存本身不持有存储。
pub struct BlockCache<S = DefaultHasher> {
    /// LRU缓存核心：管理块的生命周期和访问顺序
    blocks: LruCache<BlockKey, CachedBlock, S>,

    /// 脏块集合：追踪需要写回的块
    dirty_set: BTreeSet<BlockKey>,

    /// 统计信息
    stats: CacheStats,
}

impl BlockCache {
    /// 使用默认哈希策略创建块缓存
    ///
    /// # 参数
    ///
    /// * `capacity` - 缓存容量（块数量）
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self::with_hasher(capacity, DefaultHasher::default())
    }
}

impl<S: BuildHasher> BlockCache<S> {
    /// 使用指定的键哈希策略创建块缓存
    ///
    /// # 示例
    ///
    /// ```rust,ignore
    /// let cache = BlockCache::with_hasher(NonZeroUsize::new(64).unwrap(), MixState);
    /// ```
    pub fn with_hasher(capacity: NonZeroUsize, hasher: S) -> Self {
        Self {
            blocks: LruCache::with_hasher(capacity, hasher),
            dirty_set: BTreeSet::new(),
            stats: CacheStats::default(),
        }
    }

    fn record_access(&mut self, hit: bool) {
        self.stats.total_accesses += 1;
        if hit {
            self.stats.hits += 1;
        } else {
            self.stats.misses += 1;
        }
    }

    /// 查找块
    ///
    /// 命中时把块提升为最近使用，不做任何 I/O
    pub fn lookup(&mut self, key: BlockKey) -> Option<&mut CachedBlock> {
        let hit = self.blocks.contains(&key);
        self.record_access(hit);
        if hit {
            log::trace!("[CACHE] lookup {} HIT", key);
        }
        self.blocks.get_mut(&key)
    }

    /// 从存储加载块并作为最近使用插入
    ///
    /// 缓存已满时先驱逐最久未使用的块（脏块先写回）。
    /// 存储在此处不足一块时，块长度等于实际读到的字节数。
    ///
    /// # 错误
    ///
    /// - 定位读取失败：返回 `Store` 错误，缓存不变
    /// - 驱逐时写回失败：返回该错误，被驱逐的候选块保留且仍为脏
    pub fn load<B>(&mut self, key: BlockKey, store: &mut B) -> Result<&mut CachedBlock>
    where
        B: BackingStore + ?Sized,
    {
        if self.blocks.contains(&key) {
            return self
                .blocks
                .get_mut(&key)
                .ok_or(Error::new(ErrorKind::InvalidState, "cached block disappeared"));
        }

        let mut data = alloc::vec![0u8; BLOCK_SIZE];
        let n = store.fill_at(key.handle, key.offset, &mut data)?;
        data.truncate(n);

        if self.blocks.len() >= self.capacity() {
            self.warn_dirty_ratio();
            self.evict_one(store)?;
        }

        self.blocks.put(key, CachedBlock::new(key, data));
        self.stats.loads += 1;
        log::debug!(
            "[CACHE] load {} ({} bytes), cache={}/{}",
            key,
            n,
            self.blocks.len(),
            self.capacity()
        );

        self.blocks
            .get_mut(&key)
            .ok_or(Error::new(ErrorKind::InvalidState, "loaded block disappeared"))
    }

    /// 查找块，未命中则加载
    pub fn get_or_load<B>(&mut self, key: BlockKey, store: &mut B) -> Result<&mut CachedBlock>
    where
        B: BackingStore + ?Sized,
    {
        if self.blocks.contains(&key) {
            self.record_access(true);
            log::trace!("[CACHE] {} HIT", key);
            return self
                .blocks
                .get_mut(&key)
                .ok_or(Error::new(ErrorKind::InvalidState, "cached block disappeared"));
        }

        self.record_access(false);
        log::debug!("[CACHE] {} MISS", key);
        self.load(key, store)
    }

    /// 标记块为脏
    ///
    /// 块必须已在缓存中；不改变 LRU 顺序
    pub fn mark_dirty(&mut self, key: BlockKey) -> Result<()> {
        let block = self
            .blocks
            .peek_mut(&key)
            .ok_or(Error::new(ErrorKind::NotFound, "block not in cache"))?;
        block.mark_dirty();
        if self.dirty_set.insert(key) {
            log::trace!("[CACHE] mark_dirty {}, total_dirty={}", key, self.dirty_set.len());
        }
        Ok(())
    }

    /// 写回单个块
    ///
    /// 块是脏的才会写：把整个缓冲区定位写到块偏移处。不改变 LRU 顺序。
    ///
    /// # 返回
    ///
    /// 是否真的发生了写回。失败时脏标志保持不变。
    pub fn flush<B>(&mut self, key: BlockKey, store: &mut B) -> Result<bool>
    where
        B: BackingStore + ?Sized,
    {
        let Some(block) = self.blocks.peek_mut(&key) else {
            return Ok(false);
        };
        if !block.is_dirty() {
            return Ok(false);
        }

        if let Err(e) = store.write_all_at(key.handle, key.offset, block.data()) {
            log::error!("[CACHE] flush {} failed: {}", key, e);
            return Err(e);
        }

        block.mark_clean();
        self.dirty_set.remove(&key);
        self.stats.writebacks += 1;
        log::debug!("[CACHE] flushed {} ({} bytes)", key, block.len());
        Ok(true)
    }

    /// 驱逐最久未使用的块
    ///
    /// # 返回
    ///
    /// 被驱逐的块键；缓存为空时返回 `None`。
    /// 候选块写回失败时不驱逐，返回错误。
    pub fn evict_one<B>(&mut self, store: &mut B) -> Result<Option<BlockKey>>
    where
        B: BackingStore + ?Sized,
    {
        let Some((&key, _)) = self.blocks.peek_lru() else {
            return Ok(None);
        };

        if let Err(e) = self.flush(key, store) {
            log::error!("[CACHE] keeping dirty block {}: eviction write-back failed", key);
            return Err(e);
        }

        self.blocks.pop(&key);
        self.dirty_set.remove(&key);
        self.stats.evictions += 1;
        log::debug!("[CACHE] evicted {}", key);
        Ok(Some(key))
    }

    /// 写回所有脏块
    ///
    /// 每个脏块都会尝试；有失败时返回第一个错误，失败的块保持为脏。
    ///
    /// # 返回
    ///
    /// 写回的块数量
    pub fn flush_all<B>(&mut self, store: &mut B) -> Result<usize>
    where
        B: BackingStore + ?Sized,
    {
        let dirty: Vec<BlockKey> = self.dirty_set.iter().copied().collect();
        log::debug!("[CACHE] flushing {} dirty blocks", dirty.len());
        self.flush_keys(dirty, store)
    }

    /// 写回某个句柄的所有脏块，块仍留在缓存中
    pub fn flush_handle<B>(&mut self, handle: Handle, store: &mut B) -> Result<usize>
    where
        B: BackingStore + ?Sized,
    {
        let dirty: Vec<BlockKey> = self
            .dirty_set
            .range(BlockKey::first_of(handle)..=BlockKey::last_of(handle))
            .copied()
            .collect();
        log::debug!("[CACHE] flushing {} dirty blocks of {}", dirty.len(), handle);
        self.flush_keys(dirty, store)
    }

    fn flush_keys<B>(&mut self, keys: Vec<BlockKey>, store: &mut B) -> Result<usize>
    where
        B: BackingStore + ?Sized,
    {
        let mut flushed = 0;
        let mut first_err = None;
        for key in keys {
            match self.flush(key, store) {
                Ok(true) => flushed += 1,
                Ok(false) => {}
                Err(e) => {
                    first_err.get_or_insert(e);
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(flushed),
        }
    }

    /// 从缓存中移除某个句柄的所有块
    ///
    /// 应在 `flush_handle` 成功之后调用。仍为脏的块不会被移除。
    ///
    /// # 返回
    ///
    /// 实际移除的块数量
    pub fn remove_handle(&mut self, handle: Handle) -> usize {
        let keys: Vec<BlockKey> = self
            .blocks
            .iter()
            .filter(|(key, _)| key.handle == handle)
            .map(|(key, _)| *key)
            .collect();

        let mut removed = 0;
        for key in keys {
            if self.dirty_set.contains(&key) {
                log::warn!("[CACHE] not removing dirty block {}", key);
                continue;
            }
            self.blocks.pop(&key);
            removed += 1;
        }
        log::debug!("[CACHE] removed {} blocks of {}", removed, handle);
        removed
    }

    fn warn_dirty_ratio(&self) {
        let dirty_ratio = (self.dirty_set.len() * 100) / self.blocks.len().max(1);
        if dirty_ratio > DIRTY_WARN_RATIO {
            log::warn!(
                "[CACHE] High dirty ratio: {}/{} ({}%)",
                self.dirty_set.len(),
                self.blocks.len(),
                dirty_ratio
            );
        }
    }

    /// 块是否在缓存中（不改变 LRU 顺序）
    pub fn contains(&self, key: BlockKey) -> bool {
        self.blocks.contains(&key)
    }

    /// 只读查看块（不改变 LRU 顺序，不计入统计）
    pub fn peek(&self, key: BlockKey) -> Option<&CachedBlock> {
        self.blocks.peek(&key)
    }

    /// 下一个驱逐候选
    pub fn eviction_candidate(&self) -> Option<BlockKey> {
        self.blocks.peek_lru().map(|(key, _)| *key)
    }

    /// 某个句柄在缓存中的块数量
    pub fn handle_blocks(&self, handle: Handle) -> usize {
        self.blocks.iter().filter(|(key, _)| key.handle == handle).count()
    }

    /// 获取缓存统计信息
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.dirty_blocks = self.dirty_set.len();
        stats
    }

    /// 获取缓存容量
    pub fn capacity(&self) -> usize {
        self.blocks.cap().get()
    }

    /// 获取当前缓存块数量
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// 检查缓存是否为空
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// 获取脏块数量
    pub fn dirty_count(&self) -> usize {
        self.dirty_set.len()
    }
}

impl<S: BuildHasher> core::fmt::Debug for BlockCache<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BlockCache")
            .field("capacity", &self.blocks.cap())
            .field("len", &self.blocks.len())
            .field("dirty_count", &self.dirty_set.len())
            .field("stats", &self.stats)
            .finish()
    }
}
