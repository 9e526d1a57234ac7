//! 缓存常量定义
//!
//! 默认值与常见教学内核的参数保持一致，可通过
//! [`CacheConfig`](crate::types::CacheConfig) 覆盖。

/// 默认缓冲区数量（槽位容量）
pub const NBUF: usize = 30;

/// 默认哈希桶数量
///
/// 取素数可以让 `(dev + blockno) % NBUCKET` 在连续块号上分布更均匀。
pub const NBUCKET: usize = 13;

/// 默认块大小（字节）
pub const BSIZE: usize = 1024;
