//! 文件后备存储
//!
//! 使用 `std::os::unix::fs::FileExt` 做 pread/pwrite，定位读写不依赖共享游标。
//! 游标读写和定位直接交给操作系统的文件偏移。

use alloc::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, Write};
use std::os::unix::fs::{FileExt, OpenOptionsExt};

use super::BackingStore;
use crate::{
    error::{Error, ErrorKind, Result},
    types::{Handle, OpenFlags, SeekFrom},
};

fn io_error(kind: ErrorKind, message: &'static str, err: io::Error) -> Error {
    match err.kind() {
        io::ErrorKind::NotFound => Error::with_cause(ErrorKind::NotFound, message, err),
        _ => Error::with_cause(kind, message, err),
    }
}

#[cfg(target_os = "linux")]
fn direct_flag(flags: OpenFlags) -> i32 {
    if flags.contains(OpenFlags::DIRECT) {
        libc::O_DIRECT
    } else {
        0
    }
}

#[cfg(not(target_os = "linux"))]
fn direct_flag(_flags: OpenFlags) -> i32 {
    0
}

/// 文件存储
///
/// 每个句柄对应一个打开的 [`File`]，编号按最小空闲值分配。
#[derive(Debug, Default)]
pub struct FileStore {
    files: BTreeMap<Handle, File>,
}

impl FileStore {
    /// 创建文件存储
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前打开的句柄数量
    pub fn open_count(&self) -> usize {
        self.files.len()
    }

    fn file(&self, handle: Handle) -> Result<&File> {
        self.files
            .get(&handle)
            .ok_or(Error::new(ErrorKind::NotFound, "bad handle"))
    }

    fn next_handle(&self) -> Handle {
        let mut raw = 0;
        for handle in self.files.keys() {
            if handle.0 != raw {
                break;
            }
            raw += 1;
        }
        Handle(raw)
    }
}

impl BackingStore for FileStore {
    fn open(&mut self, path: &str, flags: OpenFlags, mode: u32) -> Result<Handle> {
        let mut options = OpenOptions::new();
        options
            .read(flags.contains(OpenFlags::READ))
            .write(flags.contains(OpenFlags::WRITE))
            .create(flags.contains(OpenFlags::CREATE))
            .truncate(flags.contains(OpenFlags::TRUNCATE))
            .mode(mode)
            .custom_flags(direct_flag(flags));

        let file = options
            .open(path)
            .map_err(|e| io_error(ErrorKind::Store, "open failed", e))?;
        let handle = self.next_handle();
        self.files.insert(handle, file);
        log::debug!("[STORE] file open {:?} -> {} ({:?})", path, handle, flags);
        Ok(handle)
    }

    fn close(&mut self, handle: Handle) -> Result<()> {
        self.files
            .remove(&handle)
            .map(drop)
            .ok_or(Error::new(ErrorKind::NotFound, "bad handle"))
    }

    fn read_at(&mut self, handle: Handle, offset: u64, buf: &mut [u8]) -> Result<usize> {
        self.file(handle)?
            .read_at(buf, offset)
            .map_err(|e| io_error(ErrorKind::Store, "pread failed", e))
    }

    fn write_at(&mut self, handle: Handle, offset: u64, buf: &[u8]) -> Result<usize> {
        self.file(handle)?
            .write_at(buf, offset)
            .map_err(|e| io_error(ErrorKind::Store, "pwrite failed", e))
    }

    fn sync(&mut self, handle: Handle) -> Result<()> {
        self.file(handle)?
            .sync_all()
            .map_err(|e| io_error(ErrorKind::Store, "fsync failed", e))
    }

    fn seek(&mut self, handle: Handle, pos: SeekFrom) -> Result<u64> {
        let pos = match pos {
            SeekFrom::Start(offset) => io::SeekFrom::Start(offset),
            SeekFrom::End(delta) => io::SeekFrom::End(delta),
            SeekFrom::Current(delta) => io::SeekFrom::Current(delta),
        };
        let mut file = self
            .files
            .get(&handle)
            .ok_or(Error::new(ErrorKind::Position, "seek on bad handle"))?;
        file.seek(pos)
            .map_err(|e| Error::with_cause(ErrorKind::Position, "lseek failed", e))
    }

    fn read(&mut self, handle: Handle, buf: &mut [u8]) -> Result<usize> {
        let mut file = self.file(handle)?;
        file.read(buf)
            .map_err(|e| io_error(ErrorKind::Store, "read failed", e))
    }

    fn write(&mut self, handle: Handle, buf: &[u8]) -> Result<usize> {
        let mut file = self.file(handle)?;
        file.write(buf)
            .map_err(|e| io_error(ErrorKind::Store, "write failed", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path_in(dir: &tempfile::TempDir, name: &str) -> std::string::String {
        dir.path().join(name).to_string_lossy().into_owned()
    }

    #[test]
    fn test_positional_io_leaves_cursor() {
        let dir = tempfile::tempdir().unwrap();
        let path = path_in(&dir, "data.bin");
        let mut store = FileStore::new();
        let h = store
            .open(&path, OpenFlags::READ_WRITE | OpenFlags::CREATE, 0o644)
            .unwrap();

        store.write_all_at(h, 10, b"0123456789").unwrap();
        assert_eq!(store.position(h).unwrap(), 0);

        let mut buf = [0u8; 32];
        assert_eq!(store.fill_at(h, 15, &mut buf).unwrap(), 5);
        assert_eq!(&buf[..5], b"56789");
        store.close(h).unwrap();

        assert_eq!(std::fs::read(&path).unwrap().len(), 20);
    }

    #[test]
    fn test_cursor_io() {
        let dir = tempfile::tempdir().unwrap();
        let path = path_in(&dir, "cursor.bin");
        let mut store = FileStore::new();
        let h = store
            .open(&path, OpenFlags::READ_WRITE | OpenFlags::CREATE, 0o644)
            .unwrap();

        assert_eq!(store.write(h, b"abcdef").unwrap(), 6);
        assert_eq!(store.seek(h, SeekFrom::Current(-3)).unwrap(), 3);
        let mut buf = [0u8; 8];
        assert_eq!(store.read(h, &mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], b"def");
        store.sync(h).unwrap();
    }

    #[test]
    fn test_missing_file_and_bad_handle() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::new();
        let err = store
            .open(&path_in(&dir, "absent"), OpenFlags::READ, 0)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = store.close(Handle(42)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(
            store.seek(Handle(42), SeekFrom::Start(0)).unwrap_err().kind(),
            ErrorKind::Position
        );
    }

    #[test]
    fn test_handles_are_reused() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::new();
        let flags = OpenFlags::READ_WRITE | OpenFlags::CREATE;
        let a = store.open(&path_in(&dir, "a"), flags, 0o644).unwrap();
        let b = store.open(&path_in(&dir, "b"), flags, 0o644).unwrap();
        store.close(a).unwrap();
        assert_eq!(store.open(&path_in(&dir, "c"), flags, 0o644).unwrap(), a);
        assert_ne!(a, b);
        assert_eq!(store.open_count(), 2);
    }
}
