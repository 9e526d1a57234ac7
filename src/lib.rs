//! bcache_core: 内核缓冲区缓存
//!
//! 固定大小的磁盘块缓冲池，供文件系统等所有访问持久存储的子系统共享：
//! - 缓存最近使用的块，减少物理传输；
//! - 作为同一磁盘块并发读写的同步点，保证观察到一致、串行化的内容。
//!
//! # 示例
//!
//! ```rust,ignore
//! use bcache_core::{BlockCache, CacheConfig, RamDisk, StdHal, Result};
//!
//! fn main() -> Result<()> {
//!     let disk = RamDisk::new(1024, 1000);
//!     let cache: BlockCache<_, StdHal> = BlockCache::new(disk, CacheConfig::default())?;
//!
//!     let mut buf = cache.read(1, 33)?;
//!     buf.data_mut()[0] = 0x42;
//!     buf.write()?;
//!     cache.release(buf);
//!
//!     Ok(())
//! }
//! ```
//!
//! # 模块结构
//!
//! - [`error`] - 错误类型与致命错误
//! - [`block`] - 块设备接口与内存盘
//! - [`cache`] - 哈希桶目录、查找/回收引擎、公共操作
//! - [`sync`] - 睡眠锁
//! - [`hal`] - 平台抽象（节拍、执行流标识、睡眠/唤醒）
//! - [`consts`] / [`types`] - 常量、标识与配置

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

extern crate alloc;

/// 错误处理
pub mod error;

/// 块设备抽象
pub mod block;

/// 常量定义
pub mod consts;

/// 公共数据类型
pub mod types;

/// 平台抽象
pub mod hal;

/// 同步原语
pub mod sync;

/// 块缓存
pub mod cache;

// ===== 公共导出 =====

// 错误处理
pub use error::{Error, ErrorKind, Fatal, Result};

// 块设备
pub use block::{BlockDevice, RamDisk};

// 类型与配置
pub use types::{BlockId, CacheConfig};

// 平台
pub use hal::SystemHal;
#[cfg(any(test, feature = "std"))]
pub use hal::StdHal;

// Cache
pub use cache::{BlockCache, BufGuard, BufInfo, BufferId, CacheStats, PinnedBuf};
