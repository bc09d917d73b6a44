//! 缓存块结构

use alloc::vec::Vec;

use crate::{
    consts::BLOCK_SIZE,
    types::{BlockKey, Handle},
};

/// 缓存块
///
/// 持有 `(handle, offset)` 处一个块的内容。
///
/// # 字段说明
///
/// - `key`: 块键
/// - `data`: 块内容。通常恰好 `BLOCK_SIZE` 字节；只有覆盖存储末尾的块会更短，永远不会更长
/// - `dirty`: 为真时 `data` 中有尚未写回存储的字节
#[derive(Debug, Clone)]
pub struct CachedBlock {
    key: BlockKey,
    data: Vec<u8>,
    dirty: bool,
}

impl CachedBlock {
    /// 用从存储读到的内容创建干净块
    pub(crate) fn new(key: BlockKey, data: Vec<u8>) -> Self {
        debug_assert!(data.len() <= BLOCK_SIZE);
        Self {
            key,
            data,
            dirty: false,
        }
    }

    /// 块键
    pub fn key(&self) -> BlockKey {
        self.key
    }

    /// 所属句柄
    pub fn handle(&self) -> Handle {
        self.key.handle
    }

    /// 块起始偏移
    pub fn offset(&self) -> u64 {
        self.key.offset
    }

    /// 块内容
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// 当前内容长度
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// 是否没有任何内容（存储在此处尚无数据）
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// 是否是不满一块的尾块
    pub fn is_partial(&self) -> bool {
        self.data.len() < BLOCK_SIZE
    }

    /// 是否是脏块
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// 标记为脏（已修改）
    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// 标记为干净（已写入存储）
    pub(crate) fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// 从块内偏移 `in_block` 读出最多 `buf.len()` 字节
    ///
    /// 越过当前内容末尾的部分视为数据结束，返回实际复制的字节数。
    pub fn read_into(&self, in_block: usize, buf: &mut [u8]) -> usize {
        let avail = self.data.len().saturating_sub(in_block).min(buf.len());
        if avail == 0 {
            return 0;
        }
        buf[..avail].copy_from_slice(&self.data[in_block..in_block + avail]);
        avail
    }

    /// 在块内偏移 `in_block` 处写入 `src`
    ///
    /// 恰好覆盖整块时直接整体替换；否则合并进已有内容，
    /// 写入末端超过当前长度时先扩展（中间空洞补零）。不改变脏标志。
    pub fn overwrite(&mut self, in_block: usize, src: &[u8]) {
        let end = in_block + src.len();
        debug_assert!(end <= BLOCK_SIZE);

        if in_block == 0 && src.len() == BLOCK_SIZE {
            self.data.clear();
            self.data.extend_from_slice(src);
            return;
        }
        if self.data.len() < end {
            self.data.resize(end, 0);
        }
        self.data[in_block..end].copy_from_slice(src);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn key() -> BlockKey {
        BlockKey::new(Handle(1), 4096)
    }

    #[test]
    fn test_block_creation() {
        let block = CachedBlock::new(key(), vec![0u8; BLOCK_SIZE]);
        assert_eq!(block.handle(), Handle(1));
        assert_eq!(block.offset(), 4096);
        assert_eq!(block.len(), BLOCK_SIZE);
        assert!(!block.is_dirty());
        assert!(!block.is_partial());
    }

    #[test]
    fn test_dirty_flag() {
        let mut block = CachedBlock::new(key(), vec![]);
        assert!(!block.is_dirty());

        block.mark_dirty();
        assert!(block.is_dirty());

        block.mark_clean();
        assert!(!block.is_dirty());
    }

    #[test]
    fn test_read_stops_at_tail() {
        let block = CachedBlock::new(key(), vec![9u8; 100]);
        let mut buf = [0u8; 64];
        assert_eq!(block.read_into(80, &mut buf), 20);
        assert!(buf[..20].iter().all(|&b| b == 9));
        assert_eq!(block.read_into(100, &mut buf), 0);
        assert_eq!(block.read_into(200, &mut buf), 0);
    }

    #[test]
    fn test_overwrite_grows_tail() {
        let mut block = CachedBlock::new(key(), vec![1u8; 10]);
        block.overwrite(20, &[2u8; 5]);
        assert_eq!(block.len(), 25);
        assert_eq!(&block.data()[..10], &[1u8; 10]);
        assert_eq!(&block.data()[10..20], &[0u8; 10]);
        assert_eq!(&block.data()[20..], &[2u8; 5]);
    }

    #[test]
    fn test_overwrite_merges_inside() {
        let mut block = CachedBlock::new(key(), vec![1u8; BLOCK_SIZE]);
        block.overwrite(100, b"abc");
        assert_eq!(block.len(), BLOCK_SIZE);
        assert_eq!(&block.data()[99..104], &[1, b'a', b'b', b'c', 1]);
    }

    #[test]
    fn test_full_block_replaces() {
        let mut block = CachedBlock::new(key(), vec![1u8; 7]);
        block.overwrite(0, &[3u8; BLOCK_SIZE]);
        assert_eq!(block.data(), &[3u8; BLOCK_SIZE][..]);
        assert!(!block.is_partial());
    }
}
