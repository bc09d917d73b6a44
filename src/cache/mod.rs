//! 块缓存模块
//!
//! 固定块大小的写回缓存核心：块寻址、准入与查找、LRU 顺序、脏块跟踪、驱逐和按需写回。
//!
//! # 主要组件
//!
//! - [`CachedBlock`] - 单个缓存块，包含数据和脏标志
//! - [`BlockCache`] - 块缓存管理器，使用 lru crate 提供 LRU 驱逐
//! - [`MixState`] - 可选的 64 位混合键哈希策略
//! - [`CacheStats`] - 缓存统计信息
//!
//! # 设计原理
//!
//! 1. **数据结构**：`lru::LruCache<BlockKey, CachedBlock, S>` 提供 O(1) 查找、提升和驱逐，
//!    另有 `BTreeSet<BlockKey>` 记录脏块
//! 2. **块键**：`(handle, offset)`，句柄编号被重用时不会命中旧块
//! 3. **哈希策略**：键哈希是可注入的配置项，不同策略共用同一份缓存实现
//! 4. **写回**：只有脏块会被写回；写回失败的块不会被驱逐
//!
//! # 使用示例
//!
//! ```rust,ignore
//! use blkcache::{BlockCache, BlockKey, Handle};
//!
//! let mut cache = BlockCache::new(NonZeroUsize::new(64).unwrap());
//! let key = BlockKey::new(handle, 8192);
//!
//! let block = cache.get_or_load(key, &mut store)?;
//! block.overwrite(0, b"hello");
//! cache.mark_dirty(key)?;
//!
//! cache.flush_handle(handle, &mut store)?;
//! println!("hit rate: {:.2}", cache.stats().hit_rate());
//! ```
//!
//! # 性能特性
//!
//! - **查找**: O(1)
//! - **插入**: O(1)，必要时加一次驱逐
//! - **LRU 驱逐**: O(1)
//! - **按句柄刷新**: O(k log n)，k 为该句柄的脏块数量
//! - **按句柄移除**: O(n)

mod block_cache;
mod buffer;
mod hash;

pub use block_cache::{BlockCache, CacheStats};
pub use buffer::CachedBlock;
pub use hash::{MixHasher, MixState};
