//! 内存后备存储
//!
//! 以路径为键保存若干命名文件，每个打开的句柄有自己的游标。
//! 同时记录物理读写次数，便于观察缓存实际产生的存储流量。

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use super::{resolve_seek, BackingStore};
use crate::{
    error::{Error, ErrorKind, Result},
    types::{Handle, OpenFlags, SeekFrom},
};

/// 物理 I/O 统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// 定位读取次数
    pub reads: u64,
    /// 定位写入次数
    pub writes: u64,
    /// 同步次数
    pub syncs: u64,
    /// 写入的总字节数
    pub bytes_written: u64,
}

/// 一次定位写入的记录
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteRecord {
    /// 句柄
    pub handle: Handle,
    /// 写入偏移
    pub offset: u64,
    /// 写入长度
    pub len: usize,
}

#[derive(Debug)]
struct OpenFile {
    path: String,
    flags: OpenFlags,
    pos: u64,
}

/// 内存存储
#[derive(Debug, Default)]
pub struct MemStore {
    files: BTreeMap<String, Vec<u8>>,
    open: BTreeMap<Handle, OpenFile>,
    stats: StoreStats,
    write_log: Vec<WriteRecord>,
}

impl MemStore {
    /// 创建空存储
    pub fn new() -> Self {
        Self::default()
    }

    /// 直接放入一个文件（不经过句柄，不计入统计）
    pub fn insert_file(&mut self, path: &str, data: Vec<u8>) {
        self.files.insert(path.to_string(), data);
    }

    /// 文件当前内容
    pub fn contents(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(Vec::as_slice)
    }

    /// 物理 I/O 统计
    pub fn stats(&self) -> &StoreStats {
        &self.stats
    }

    /// 全部定位写入记录，按发生顺序
    pub fn write_log(&self) -> &[WriteRecord] {
        &self.write_log
    }

    /// 句柄是否处于打开状态
    pub fn is_open(&self, handle: Handle) -> bool {
        self.open.contains_key(&handle)
    }

    /// 句柄打开时实际收到的标志
    pub fn open_flags(&self, handle: Handle) -> Option<OpenFlags> {
        self.open.get(&handle).map(|entry| entry.flags)
    }

    fn entry(&self, handle: Handle) -> Result<&OpenFile> {
        self.open
            .get(&handle)
            .ok_or(Error::new(ErrorKind::NotFound, "bad handle"))
    }

    /// 分配最小的空闲编号
    fn next_handle(&self) -> Handle {
        let mut raw = 0;
        for handle in self.open.keys() {
            if handle.0 != raw {
                break;
            }
            raw += 1;
        }
        Handle(raw)
    }
}

impl BackingStore for MemStore {
    fn open(&mut self, path: &str, flags: OpenFlags, _mode: u32) -> Result<Handle> {
        if !self.files.contains_key(path) {
            if !flags.contains(OpenFlags::CREATE) {
                return Err(Error::new(ErrorKind::NotFound, "no such file"));
            }
            self.files.insert(path.to_string(), Vec::new());
        }
        if flags.contains(OpenFlags::TRUNCATE) {
            if let Some(data) = self.files.get_mut(path) {
                data.clear();
            }
        }

        let handle = self.next_handle();
        self.open.insert(
            handle,
            OpenFile {
                path: path.to_string(),
                flags,
                pos: 0,
            },
        );
        log::debug!("[STORE] mem open {:?} -> {} ({:?})", path, handle, flags);
        Ok(handle)
    }

    fn close(&mut self, handle: Handle) -> Result<()> {
        self.open
            .remove(&handle)
            .map(|_| ())
            .ok_or(Error::new(ErrorKind::NotFound, "bad handle"))
    }

    fn read_at(&mut self, handle: Handle, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let entry = self.entry(handle)?;
        if !entry.flags.contains(OpenFlags::READ) {
            return Err(Error::new(ErrorKind::Store, "handle not open for reading"));
        }
        let data = self.files.get(&entry.path).map(Vec::as_slice).unwrap_or(&[]);

        let start = (offset.min(data.len() as u64)) as usize;
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);

        self.stats.reads += 1;
        Ok(n)
    }

    fn write_at(&mut self, handle: Handle, offset: u64, buf: &[u8]) -> Result<usize> {
        let entry = self
            .open
            .get(&handle)
            .ok_or(Error::new(ErrorKind::NotFound, "bad handle"))?;
        if !entry.flags.contains(OpenFlags::WRITE) {
            return Err(Error::new(ErrorKind::Store, "handle not open for writing"));
        }
        let data = self.files.entry(entry.path.clone()).or_default();

        let start = usize::try_from(offset)
            .map_err(|_| Error::new(ErrorKind::InvalidInput, "offset exceeds address space"))?;
        let end = start
            .checked_add(buf.len())
            .ok_or(Error::new(ErrorKind::InvalidInput, "write extends past address space"))?;
        if data.len() < end {
            data.try_reserve(end - data.len())
                .map_err(|e| Error::with_cause(ErrorKind::Store, "cannot grow file", e))?;
            data.resize(end, 0);
        }
        data[start..end].copy_from_slice(buf);

        self.stats.writes += 1;
        self.stats.bytes_written += buf.len() as u64;
        self.write_log.push(WriteRecord {
            handle,
            offset,
            len: buf.len(),
        });
        Ok(buf.len())
    }

    fn sync(&mut self, handle: Handle) -> Result<()> {
        self.entry(handle)?;
        self.stats.syncs += 1;
        Ok(())
    }

    fn seek(&mut self, handle: Handle, pos: SeekFrom) -> Result<u64> {
        let entry = self
            .open
            .get_mut(&handle)
            .ok_or(Error::new(ErrorKind::Position, "seek on bad handle"))?;
        let len = self.files.get(&entry.path).map_or(0, |d| d.len() as u64);
        entry.pos = resolve_seek(entry.pos, len, pos)?;
        Ok(entry.pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_requires_create() {
        let mut store = MemStore::new();
        let err = store.open("missing", OpenFlags::READ, 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let h = store.open("missing", OpenFlags::READ | OpenFlags::CREATE, 0).unwrap();
        assert!(store.is_open(h));
        assert_eq!(store.contents("missing"), Some(&[][..]));
    }

    #[test]
    fn test_lowest_free_handle_is_reused() {
        let mut store = MemStore::new();
        let flags = OpenFlags::READ | OpenFlags::CREATE;
        let a = store.open("a", flags, 0).unwrap();
        let b = store.open("b", flags, 0).unwrap();
        let c = store.open("c", flags, 0).unwrap();
        assert_eq!((a, b, c), (Handle(0), Handle(1), Handle(2)));

        store.close(b).unwrap();
        assert_eq!(store.open("d", flags, 0).unwrap(), Handle(1));
        assert_eq!(store.open("e", flags, 0).unwrap(), Handle(3));
    }

    #[test]
    fn test_write_past_end_zero_fills() {
        let mut store = MemStore::new();
        let h = store
            .open("f", OpenFlags::READ_WRITE | OpenFlags::CREATE, 0)
            .unwrap();
        store.write_at(h, 4, b"ab").unwrap();
        assert_eq!(store.contents("f"), Some(&[0, 0, 0, 0, b'a', b'b'][..]));
        assert_eq!(store.stats().writes, 1);
        assert_eq!(store.write_log()[0], WriteRecord { handle: h, offset: 4, len: 2 });
    }

    #[test]
    fn test_huge_offsets_are_rejected() {
        let mut store = MemStore::new();
        let h = store
            .open("f", OpenFlags::READ_WRITE | OpenFlags::CREATE, 0)
            .unwrap();

        let err = store.write_at(h, u64::MAX - 1, b"ab").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(store.write_at(h, 1 << 62, b"x").is_err());

        assert_eq!(store.contents("f"), Some(&[][..]));
        assert_eq!(store.stats().writes, 0);
    }

    #[test]
    fn test_access_mode_is_enforced() {
        let mut store = MemStore::new();
        let w = store.open("f", OpenFlags::WRITE | OpenFlags::CREATE, 0).unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(store.read_at(w, 0, &mut buf).unwrap_err().kind(), ErrorKind::Store);

        let r = store.open("f", OpenFlags::READ, 0).unwrap();
        assert_eq!(store.write_at(r, 0, b"x").unwrap_err().kind(), ErrorKind::Store);
    }

    #[test]
    fn test_truncate_on_open() {
        let mut store = MemStore::new();
        store.insert_file("f", alloc::vec![1, 2, 3]);
        store
            .open("f", OpenFlags::WRITE | OpenFlags::TRUNCATE, 0)
            .unwrap();
        assert_eq!(store.contents("f"), Some(&[][..]));
    }

    #[test]
    fn test_read_past_end_is_empty() {
        let mut store = MemStore::new();
        store.insert_file("f", alloc::vec![1, 2, 3]);
        let h = store.open("f", OpenFlags::READ, 0).unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(store.read_at(h, 100, &mut buf).unwrap(), 0);
        assert_eq!(store.read_at(h, 1, &mut buf).unwrap(), 2);
    }
}
