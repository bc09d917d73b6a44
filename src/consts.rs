//! 块缓存常量定义
//!
//! 这个模块包含了块缓存的所有常量定义，包括：
//! - 块大小与对齐
//! - 缓存容量默认值
//! - 脏块告警阈值

//=============================================================================
// 块布局
//=============================================================================

/// 块大小（4096 字节），所有句柄共享
pub const BLOCK_SIZE: usize = 4096;

/// 块大小（u64 形式，用于偏移计算）
pub const BLOCK_SIZE_U64: u64 = BLOCK_SIZE as u64;

//=============================================================================
// 缓存配置
//=============================================================================

/// 默认缓存块数量
pub const DEFAULT_CACHE_SIZE: usize = 256;

/// 缓存已满时脏块比例超过该百分比发出警告
pub const DIRTY_WARN_RATIO: usize = 80;

//=============================================================================
// 辅助函数
//=============================================================================

/// 将字节偏移向下对齐到块边界
#[inline]
pub const fn align_down(offset: u64) -> u64 {
    offset - offset % BLOCK_SIZE_U64
}

/// 计算 `offset` 处一次操作落在当前块内的部分
///
/// 返回 `(块起始偏移, 块内偏移, 本块内可处理的字节数)`
#[inline]
pub fn block_span(offset: u64, remaining: usize) -> (u64, usize, usize) {
    let block_offset = align_down(offset);
    let in_block = (offset - block_offset) as usize;
    let chunk = remaining.min(BLOCK_SIZE - in_block);
    (block_offset, in_block, chunk)
}
