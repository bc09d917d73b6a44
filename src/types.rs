//! 公共数据类型
//!
//! 句柄、块键、打开标志和游标定位方式。

use bitflags::bitflags;
use core::fmt;

use crate::consts::align_down;

/// 后备存储资源句柄
///
/// 不透明的编号，语义与 POSIX 文件描述符相同：关闭后编号可以被再次分配，
/// 所以缓存必须按句柄划分块键，并在关闭时清除该句柄的全部块。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Handle(pub u32);

impl Handle {
    /// 句柄编号
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 块键 `(handle, block_offset)`
///
/// `offset` 总是块大小的整数倍。按 `(handle, offset)` 排序，
/// 因此同一句柄的块在有序集合中是连续的一段。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockKey {
    /// 所属句柄
    pub handle: Handle,
    /// 块起始字节偏移
    pub offset: u64,
}

impl BlockKey {
    /// 创建块键，`offset` 会向下对齐到块边界
    pub const fn new(handle: Handle, offset: u64) -> Self {
        Self {
            handle,
            offset: align_down(offset),
        }
    }

    /// 该句柄的第一个可能的键
    pub(crate) const fn first_of(handle: Handle) -> Self {
        Self { handle, offset: 0 }
    }

    /// 该句柄的最后一个可能的键（最后一个完整对齐的块）
    pub(crate) const fn last_of(handle: Handle) -> Self {
        Self::new(handle, u64::MAX)
    }
}

impl fmt::Display for BlockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{:#x}", self.handle, self.offset)
    }
}

bitflags! {
    /// 打开标志
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpenFlags: u32 {
        /// 可读
        const READ     = 0x01;
        /// 可写
        const WRITE    = 0x02;
        /// 不存在时创建
        const CREATE   = 0x04;
        /// 打开时截断为空
        const TRUNCATE = 0x08;
        /// 绕过存储自身的缓冲（缓存启用时会被去掉）
        const DIRECT   = 0x10;
    }
}

impl OpenFlags {
    /// 读写
    pub const READ_WRITE: Self = Self::READ.union(Self::WRITE);
}

/// 游标定位方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekFrom {
    /// 距开头的绝对偏移
    Start(u64),
    /// 相对末尾
    End(i64),
    /// 相对当前位置
    Current(i64),
}
