//! blkcache: 固定块大小的写回 LRU 块缓存
//!
//! 在应用和后备存储之间加一层 4096 字节块粒度的缓存：
//! - **写回**：写入只落在缓存中，驱逐、同步、关闭或销毁时才写回存储
//! - **LRU 驱逐**：容量固定，满时驱逐最久未使用的块
//! - **透明**：[`CachedStore`] 自身也实现 [`BackingStore`]，未初始化时原样直通
//!
//! # 示例
//!
//! ```rust,ignore
//! use blkcache::{BackingStore, CachedStore, MemStore, OpenFlags, SeekFrom, Result};
//!
//! fn main() -> Result<()> {
//!     let mut store = CachedStore::new(MemStore::new());
//!     store.init(64)?;
//!
//!     let h = store.open("a.bin", OpenFlags::READ_WRITE | OpenFlags::CREATE, 0o644)?;
//!     store.write(h, &[7u8; 10_000])?;
//!     store.seek(h, SeekFrom::Start(4096))?;
//!
//!     let mut buf = [0u8; 100];
//!     store.read(h, &mut buf)?;
//!     store.close(h)?;
//!
//!     store.destroy()
//! }
//! ```
//!
//! # 模块结构
//!
//! - [`error`] - 错误类型定义
//! - [`consts`] - 常量定义
//! - [`types`] - 句柄、块键、打开标志
//! - [`store`] - 后备存储接口和适配器
//! - [`cache`] - 块缓存核心
//! - [`stream`] - 带缓存的存储包装

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

extern crate alloc;

#[cfg(any(feature = "std", test))]
extern crate std;

// ===== 核心模块 =====

/// 错误处理
pub mod error;

/// 常量定义
pub mod consts;

/// 基础类型定义
pub mod types;

/// 后备存储
pub mod store;

/// 块缓存
pub mod cache;

/// 带缓存的存储包装
pub mod stream;

// ===== 公共导出 =====

// 错误处理
pub use error::{Error, ErrorKind, Result};

// 常量
pub use consts::{BLOCK_SIZE, DEFAULT_CACHE_SIZE};

// 基础类型
pub use types::{BlockKey, Handle, OpenFlags, SeekFrom};

// 后备存储
pub use store::{BackingStore, LazyStore, MemStore, StoreStats, WriteRecord};

#[cfg(all(feature = "std", unix))]
pub use store::FileStore;
#[cfg(feature = "std")]
pub use store::SharedStore;

// Cache
pub use cache::{BlockCache, CacheStats, CachedBlock, MixHasher, MixState};

// Stream
pub use stream::CachedStore;
