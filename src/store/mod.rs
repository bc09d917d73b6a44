//! 后备存储抽象
//!
//! store/mod.rs 定义后备存储接口：按显式偏移读写（不依赖游标）、关闭、同步、定位。
//! 基于游标的 `read`/`write` 以默认方法提供：读出当前位置，做定位读写，再把游标前移。
//!
//! store/mem.rs 内存存储，测试和 no_std 环境使用
//! store/file.rs 真实文件（pread/pwrite），需要 `std`
//! store/lazy.rs 首次使用时才解析真实存储，只解析一次
//! store/shared.rs 单把大锁包装任意存储，需要 `std`

mod lazy;
mod mem;

#[cfg(all(feature = "std", unix))]
mod file;
#[cfg(feature = "std")]
mod shared;

#[cfg(test)]
pub(crate) mod testing;

pub use lazy::LazyStore;
pub use mem::{MemStore, StoreStats, WriteRecord};

#[cfg(all(feature = "std", unix))]
pub use file::FileStore;
#[cfg(feature = "std")]
pub use shared::SharedStore;

use crate::{
    error::{Error, ErrorKind, Result},
    types::{Handle, OpenFlags, SeekFrom},
};

/// 后备存储接口
///
/// 实现此 trait 以提供对真实存储（通常是文件）的访问。
///
/// # 示例
///
/// ```rust,ignore
/// use blkcache::{BackingStore, Handle, OpenFlags, SeekFrom, Result};
///
/// struct MyStore {
///     // ...
/// }
///
/// impl BackingStore for MyStore {
///     fn open(&mut self, path: &str, flags: OpenFlags, mode: u32) -> Result<Handle> {
///         // 打开资源并分配句柄
///         # unimplemented!()
///     }
///
///     fn read_at(&mut self, handle: Handle, offset: u64, buf: &mut [u8]) -> Result<usize> {
///         // pread
///         # unimplemented!()
///     }
///
///     // ...
/// }
/// ```
pub trait BackingStore {
    /// 打开资源
    ///
    /// # 参数
    ///
    /// * `path` - 资源路径
    /// * `flags` - 打开标志
    /// * `mode` - 创建时的权限位
    fn open(&mut self, path: &str, flags: OpenFlags, mode: u32) -> Result<Handle>;

    /// 关闭句柄，之后该编号可以被重新分配
    fn close(&mut self, handle: Handle) -> Result<()>;

    /// 定位读取
    ///
    /// 从 `offset` 开始最多读取 `buf.len()` 字节，不移动游标。
    ///
    /// # 返回
    ///
    /// 实际读取的字节数，0 表示已到末尾
    fn read_at(&mut self, handle: Handle, offset: u64, buf: &mut [u8]) -> Result<usize>;

    /// 定位写入
    ///
    /// 向 `offset` 写入，不移动游标。越过末尾的写入会扩展存储。
    ///
    /// # 返回
    ///
    /// 实际写入的字节数
    fn write_at(&mut self, handle: Handle, offset: u64, buf: &[u8]) -> Result<usize>;

    /// 持久化屏障（fsync）
    fn sync(&mut self, handle: Handle) -> Result<()>;

    /// 移动游标，返回新的位置
    fn seek(&mut self, handle: Handle, pos: SeekFrom) -> Result<u64>;

    /// 查询当前游标位置
    fn position(&mut self, handle: Handle) -> Result<u64> {
        self.seek(handle, SeekFrom::Current(0))
    }

    /// 定位读取直到缓冲区填满或到达末尾
    ///
    /// # 返回
    ///
    /// 实际读取的字节数，小于 `buf.len()` 说明到达了末尾
    fn fill_at(&mut self, handle: Handle, offset: u64, buf: &mut [u8]) -> Result<usize> {
        end_offset(offset, buf.len())?;
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.read_at(handle, offset + filled as u64, &mut buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(filled)
    }

    /// 定位写入全部数据
    fn write_all_at(&mut self, handle: Handle, offset: u64, buf: &[u8]) -> Result<()> {
        end_offset(offset, buf.len())?;
        let mut written = 0;
        while written < buf.len() {
            let n = self.write_at(handle, offset + written as u64, &buf[written..])?;
            if n == 0 {
                return Err(Error::new(ErrorKind::Store, "backing store accepted no bytes"));
            }
            written += n;
        }
        Ok(())
    }

    /// 从当前游标读取，并把游标前移实际读取的字节数
    fn read(&mut self, handle: Handle, buf: &mut [u8]) -> Result<usize> {
        let pos = self.position(handle)?;
        end_offset(pos, buf.len())?;
        let n = self.read_at(handle, pos, buf)?;
        self.seek(handle, SeekFrom::Start(end_offset(pos, n)?))?;
        Ok(n)
    }

    /// 在当前游标写入，并把游标前移实际写入的字节数
    fn write(&mut self, handle: Handle, buf: &[u8]) -> Result<usize> {
        let pos = self.position(handle)?;
        end_offset(pos, buf.len())?;
        let n = self.write_at(handle, pos, buf)?;
        self.seek(handle, SeekFrom::Start(end_offset(pos, n)?))?;
        Ok(n)
    }
}

impl<T: BackingStore + ?Sized> BackingStore for &mut T {
    fn open(&mut self, path: &str, flags: OpenFlags, mode: u32) -> Result<Handle> {
        (**self).open(path, flags, mode)
    }

    fn close(&mut self, handle: Handle) -> Result<()> {
        (**self).close(handle)
    }

    fn read_at(&mut self, handle: Handle, offset: u64, buf: &mut [u8]) -> Result<usize> {
        (**self).read_at(handle, offset, buf)
    }

    fn write_at(&mut self, handle: Handle, offset: u64, buf: &[u8]) -> Result<usize> {
        (**self).write_at(handle, offset, buf)
    }

    fn sync(&mut self, handle: Handle) -> Result<()> {
        (**self).sync(handle)
    }

    fn seek(&mut self, handle: Handle, pos: SeekFrom) -> Result<u64> {
        (**self).seek(handle, pos)
    }

    fn read(&mut self, handle: Handle, buf: &mut [u8]) -> Result<usize> {
        (**self).read(handle, buf)
    }

    fn write(&mut self, handle: Handle, buf: &[u8]) -> Result<usize> {
        (**self).write(handle, buf)
    }
}

/// `offset + len`，超出 u64 范围时返回 `InvalidInput` 错误
pub(crate) fn end_offset(offset: u64, len: usize) -> Result<u64> {
    offset
        .checked_add(len as u64)
        .ok_or(Error::new(ErrorKind::InvalidInput, "I/O range exceeds u64 offsets"))
}

/// 按 `SeekFrom` 计算新的游标位置
///
/// 结果为负或溢出时返回 `Position` 错误
pub(crate) fn resolve_seek(current: u64, len: u64, pos: SeekFrom) -> Result<u64> {
    let (base, delta) = match pos {
        SeekFrom::Start(offset) => return Ok(offset),
        SeekFrom::End(delta) => (len, delta),
        SeekFrom::Current(delta) => (current, delta),
    };
    base.checked_add_signed(delta)
        .ok_or(Error::new(ErrorKind::Position, "seek to a negative or overflowing position"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_seek() {
        assert_eq!(resolve_seek(10, 100, SeekFrom::Start(5)).unwrap(), 5);
        assert_eq!(resolve_seek(10, 100, SeekFrom::Current(-4)).unwrap(), 6);
        assert_eq!(resolve_seek(10, 100, SeekFrom::End(20)).unwrap(), 120);

        let err = resolve_seek(10, 100, SeekFrom::Current(-11)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Position);
    }

    #[test]
    fn test_default_cursor_read_write() {
        let mut store = MemStore::new();
        let h = store
            .open("a", OpenFlags::READ_WRITE | OpenFlags::CREATE, 0o644)
            .unwrap();

        assert_eq!(store.write(h, b"hello world").unwrap(), 11);
        assert_eq!(store.position(h).unwrap(), 11);

        store.seek(h, SeekFrom::Start(6)).unwrap();
        let mut buf = [0u8; 16];
        let n = store.read(h, &mut buf).unwrap();
        assert_eq!(&buf[..n], b"world");
        assert_eq!(store.position(h).unwrap(), 11);
    }

    #[test]
    fn test_fill_at_stops_at_eof() {
        let mut store = MemStore::new();
        store.insert_file("a", alloc::vec![7u8; 100]);
        let h = store.open("a", OpenFlags::READ, 0).unwrap();

        let mut buf = [0u8; 256];
        assert_eq!(store.fill_at(h, 40, &mut buf).unwrap(), 60);
        assert!(buf[..60].iter().all(|&b| b == 7));
    }
}
