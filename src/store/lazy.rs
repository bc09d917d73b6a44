//! 延迟解析的后备存储
//!
//! 真实存储在第一次被调用时才通过闭包解析，之后一直复用。
//! 解析失败是永久性的：之后的每次调用都返回 `Resolution` 错误。

use super::BackingStore;
use crate::{
    error::{Error, ErrorKind, Result},
    types::{Handle, OpenFlags, SeekFrom},
};

enum State<S, F> {
    Pending(F),
    Ready(S),
    Failed,
}

/// 延迟解析的存储
///
/// # 示例
///
/// ```rust,ignore
/// let mut store = LazyStore::new(|| Ok(FileStore::new()));
/// // 此时尚未创建 FileStore
/// let h = store.open("data.bin", OpenFlags::READ, 0)?;  // 第一次调用时解析
/// ```
pub struct LazyStore<S, F> {
    state: State<S, F>,
}

impl<S, F> LazyStore<S, F>
where
    S: BackingStore,
    F: FnOnce() -> Result<S>,
{
    /// 创建延迟存储，`resolver` 最多被调用一次
    pub fn new(resolver: F) -> Self {
        Self {
            state: State::Pending(resolver),
        }
    }

    /// 是否已经成功解析
    pub fn is_resolved(&self) -> bool {
        matches!(self.state, State::Ready(_))
    }

    /// 是否已经解析失败
    pub fn is_failed(&self) -> bool {
        matches!(self.state, State::Failed)
    }

    /// 获取真实存储，必要时触发解析
    pub fn resolve(&mut self) -> Result<&mut S> {
        if let State::Pending(_) = self.state {
            if let State::Pending(resolver) = core::mem::replace(&mut self.state, State::Failed) {
                match resolver() {
                    Ok(store) => {
                        log::debug!("[STORE] backing store resolved");
                        self.state = State::Ready(store);
                    }
                    Err(e) => {
                        log::error!("[STORE] cannot resolve backing store: {}", e);
                    }
                }
            }
        }

        match &mut self.state {
            State::Ready(store) => Ok(store),
            _ => Err(Error::new(ErrorKind::Resolution, "backing store is unavailable")),
        }
    }
}

impl<S, F> BackingStore for LazyStore<S, F>
where
    S: BackingStore,
    F: FnOnce() -> Result<S>,
{
    fn open(&mut self, path: &str, flags: OpenFlags, mode: u32) -> Result<Handle> {
        self.resolve()?.open(path, flags, mode)
    }

    fn close(&mut self, handle: Handle) -> Result<()> {
        self.resolve()?.close(handle)
    }

    fn read_at(&mut self, handle: Handle, offset: u64, buf: &mut [u8]) -> Result<usize> {
        self.resolve()?.read_at(handle, offset, buf)
    }

    fn write_at(&mut self, handle: Handle, offset: u64, buf: &[u8]) -> Result<usize> {
        self.resolve()?.write_at(handle, offset, buf)
    }

    fn sync(&mut self, handle: Handle) -> Result<()> {
        self.resolve()?.sync(handle)
    }

    fn seek(&mut self, handle: Handle, pos: SeekFrom) -> Result<u64> {
        self.resolve()?.seek(handle, pos)
    }

    fn read(&mut self, handle: Handle, buf: &mut [u8]) -> Result<usize> {
        self.resolve()?.read(handle, buf)
    }

    fn write(&mut self, handle: Handle, buf: &[u8]) -> Result<usize> {
        self.resolve()?.write(handle, buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemStore;
    use core::cell::Cell;

    #[test]
    fn test_resolves_once_on_first_use() {
        let calls = Cell::new(0);
        let mut store = LazyStore::new(|| {
            calls.set(calls.get() + 1);
            Ok(MemStore::new())
        });
        assert!(!store.is_resolved());
        assert_eq!(calls.get(), 0);

        let h = store
            .open("f", OpenFlags::READ_WRITE | OpenFlags::CREATE, 0)
            .unwrap();
        store.write(h, b"abc").unwrap();
        store.close(h).unwrap();

        assert!(store.is_resolved());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_failure_is_sticky() {
        let calls = Cell::new(0);
        let mut store = LazyStore::new(|| -> Result<MemStore> {
            calls.set(calls.get() + 1);
            Err(Error::new(ErrorKind::NotFound, "no such primitive"))
        });

        for _ in 0..3 {
            let err = store.open("f", OpenFlags::READ, 0).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Resolution);
        }
        assert!(store.is_failed());
        assert_eq!(calls.get(), 1);
    }
}
