//! 测试辅助：可注入故障的存储与日志初始化

use super::BackingStore;
use crate::{
    error::{Error, ErrorKind, Result},
    types::{Handle, OpenFlags, SeekFrom},
};

/// 打开测试日志（多次调用无副作用）
pub(crate) fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// 按开关让定位读写失败的存储包装
pub(crate) struct FlakyStore<S> {
    pub(crate) inner: S,
    pub(crate) fail_reads: bool,
    pub(crate) fail_writes: bool,
}

impl<S> FlakyStore<S> {
    pub(crate) fn new(inner: S) -> Self {
        Self {
            inner,
            fail_reads: false,
            fail_writes: false,
        }
    }
}

impl<S: BackingStore> BackingStore for FlakyStore<S> {
    fn open(&mut self, path: &str, flags: OpenFlags, mode: u32) -> Result<Handle> {
        self.inner.open(path, flags, mode)
    }

    fn close(&mut self, handle: Handle) -> Result<()> {
        self.inner.close(handle)
    }

    fn read_at(&mut self, handle: Handle, offset: u64, buf: &mut [u8]) -> Result<usize> {
        if self.fail_reads {
            return Err(Error::new(ErrorKind::Store, "injected pread failure"));
        }
        self.inner.read_at(handle, offset, buf)
    }

    fn write_at(&mut self, handle: Handle, offset: u64, buf: &[u8]) -> Result<usize> {
        if self.fail_writes {
            return Err(Error::new(ErrorKind::Store, "injected pwrite failure"));
        }
        self.inner.write_at(handle, offset, buf)
    }

    fn sync(&mut self, handle: Handle) -> Result<()> {
        self.inner.sync(handle)
    }

    fn seek(&mut self, handle: Handle, pos: SeekFrom) -> Result<u64> {
        self.inner.seek(handle, pos)
    }
}
