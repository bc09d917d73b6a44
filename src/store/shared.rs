//! 并发访问的粗粒度锁
//!
//! 缓存本身是单线程同步设计。多线程共享时，用 [`SharedStore`] 把整个存储
//! （通常是 `CachedStore`）包在一把 `Mutex` 里：每个逻辑操作（包括它触发的
//! 写回与驱逐）在锁内完整执行，查找与“先写回再驱逐”之间不会交错。

use alloc::sync::Arc;
use std::sync::{Mutex, MutexGuard};

use super::BackingStore;
use crate::{
    error::{Error, ErrorKind, Result},
    types::{Handle, OpenFlags, SeekFrom},
};

/// 单锁共享存储
///
/// # 示例
///
/// ```rust,ignore
/// let shared = SharedStore::new(cached);
/// let worker = shared.clone();
/// std::thread::spawn(move || {
///     let mut worker = worker;
///     worker.write(h, b"...")
/// });
/// ```
pub struct SharedStore<S> {
    inner: Arc<Mutex<S>>,
}

impl<S> Clone for SharedStore<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S> SharedStore<S> {
    /// 包装一个存储
    pub fn new(store: S) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    /// 在锁内对被包装的存储执行闭包
    ///
    /// 用于初始化、销毁缓存或读取统计等不属于 [`BackingStore`] 的操作
    pub fn with<R>(&self, f: impl FnOnce(&mut S) -> R) -> Result<R> {
        let mut guard = self.guard()?;
        Ok(f(&mut guard))
    }

    fn guard(&self) -> Result<MutexGuard<'_, S>> {
        self.inner
            .lock()
            .map_err(|_| Error::new(ErrorKind::InvalidState, "store lock poisoned"))
    }
}

impl<S: BackingStore> BackingStore for SharedStore<S> {
    fn open(&mut self, path: &str, flags: OpenFlags, mode: u32) -> Result<Handle> {
        self.guard()?.open(path, flags, mode)
    }

    fn close(&mut self, handle: Handle) -> Result<()> {
        self.guard()?.close(handle)
    }

    fn read_at(&mut self, handle: Handle, offset: u64, buf: &mut [u8]) -> Result<usize> {
        self.guard()?.read_at(handle, offset, buf)
    }

    fn write_at(&mut self, handle: Handle, offset: u64, buf: &[u8]) -> Result<usize> {
        self.guard()?.write_at(handle, offset, buf)
    }

    fn sync(&mut self, handle: Handle) -> Result<()> {
        self.guard()?.sync(handle)
    }

    fn seek(&mut self, handle: Handle, pos: SeekFrom) -> Result<u64> {
        self.guard()?.seek(handle, pos)
    }

    // 游标读写需要“查位置、读写、前移”在同一次加锁内完成
    fn read(&mut self, handle: Handle, buf: &mut [u8]) -> Result<usize> {
        self.guard()?.read(handle, buf)
    }

    fn write(&mut self, handle: Handle, buf: &[u8]) -> Result<usize> {
        self.guard()?.write(handle, buf)
    }

    fn fill_at(&mut self, handle: Handle, offset: u64, buf: &mut [u8]) -> Result<usize> {
        self.guard()?.fill_at(handle, offset, buf)
    }

    fn write_all_at(&mut self, handle: Handle, offset: u64, buf: &[u8]) -> Result<()> {
        self.guard()?.write_all_at(handle, offset, buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemStore;
    use std::thread;

    #[test]
    fn test_with_runs_under_lock() {
        let shared = SharedStore::new(MemStore::new());
        shared.with(|s| s.insert_file("f", alloc::vec![1, 2, 3])).unwrap();
        let len = shared.with(|s| s.contents("f").map(<[u8]>::len)).unwrap();
        assert_eq!(len, Some(3));
    }

    #[test]
    fn test_threads_share_one_store() {
        let mut shared = SharedStore::new(MemStore::new());
        let h = shared
            .open("f", OpenFlags::READ_WRITE | OpenFlags::CREATE, 0)
            .unwrap();

        let workers: alloc::vec::Vec<_> = (0..4u8)
            .map(|i| {
                let mut store = shared.clone();
                thread::spawn(move || {
                    let chunk = [i; 64];
                    store.write_all_at(h, u64::from(i) * 64, &chunk).unwrap();
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        let mut buf = [0u8; 256];
        assert_eq!(shared.fill_at(h, 0, &mut buf).unwrap(), 256);
        for i in 0..4usize {
            assert!(buf[i * 64..(i + 1) * 64].iter().all(|&b| b == i as u8));
        }
    }
}
