//! 按块边界拆分的读写
//!
//! 一次逻辑读写从 `offset` 开始，被拆成若干落在单个块内的子操作，
//! 每个子操作先在缓存中查找块，未命中则加载，然后在块缓冲区上复制数据。
//!
//! 某个子操作失败时，如果之前已经交付了数据，返回已交付的字节数；
//! 一个字节都没有交付才返回错误。

use core::hash::BuildHasher;

use crate::{
    cache::BlockCache,
    consts::block_span,
    error::{Error, Result},
    store::{end_offset, BackingStore},
    types::{BlockKey, Handle},
};

/// 子操作失败后的返回值
fn short_or_err(handle: Handle, done: usize, err: Error) -> Result<usize> {
    if done == 0 {
        return Err(err);
    }
    log::warn!("[STREAM] {} short transfer of {} bytes: {}", handle, done, err);
    Ok(done)
}

/// 经缓存读取
///
/// 遇到比请求更短的块（存储末尾）时停止，返回已交付的字节数，不视为错误。
pub(super) fn read_blocks<B, S>(
    cache: &mut BlockCache<S>,
    store: &mut B,
    handle: Handle,
    offset: u64,
    buf: &mut [u8],
) -> Result<usize>
where
    B: BackingStore + ?Sized,
    S: BuildHasher,
{
    end_offset(offset, buf.len())?;

    let mut done = 0;
    while done < buf.len() {
        let (block_offset, in_block, chunk) = block_span(offset + done as u64, buf.len() - done);
        let block = match cache.get_or_load(BlockKey::new(handle, block_offset), store) {
            Ok(block) => block,
            Err(e) => return short_or_err(handle, done, e),
        };

        let n = block.read_into(in_block, &mut buf[done..done + chunk]);
        done += n;
        if n < chunk {
            log::trace!("[STREAM] {} end of data at {:#x}", handle, offset + done as u64);
            break;
        }
    }
    Ok(done)
}

/// 经缓存写入
///
/// 每个子操作写入块缓冲区并把块标记为脏，实际写回推迟到驱逐、同步、关闭或销毁。
pub(super) fn write_blocks<B, S>(
    cache: &mut BlockCache<S>,
    store: &mut B,
    handle: Handle,
    offset: u64,
    buf: &[u8],
) -> Result<usize>
where
    B: BackingStore + ?Sized,
    S: BuildHasher,
{
    end_offset(offset, buf.len())?;

    let mut done = 0;
    while done < buf.len() {
        let (block_offset, in_block, chunk) = block_span(offset + done as u64, buf.len() - done);
        let key = BlockKey::new(handle, block_offset);

        match cache.get_or_load(key, store) {
            Ok(block) => block.overwrite(in_block, &buf[done..done + chunk]),
            Err(e) => return short_or_err(handle, done, e),
        }
        cache.mark_dirty(key)?;
        done += chunk;
    }
    Ok(done)
}
