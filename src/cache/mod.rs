//! 块缓存模块
//!
//! 内核的缓冲区缓存：固定数量、块大小的缓冲区，由所有读写磁盘的子系统共享。
//! 它既减少物理传输，也是同一磁盘块并发读写的唯一同步点。
//!
//! # 主要组件
//!
//! - [`BlockCache`] - 目录（哈希桶 + 驱逐锁）与查找/回收引擎
//! - [`BufGuard`] - 被持有的缓冲区，丢弃即释放
//! - [`PinnedBuf`] - 被 pin 住的缓冲区
//! - [`CacheStats`] / [`BufInfo`] - 统计与目录快照
//!
//! # 接口约定
//!
//! | 操作                 | 对应                          |
//! |----------------------|-------------------------------|
//! | `bread(dev, blockno)` | [`BlockCache::read`]          |
//! | `bwrite(b)`          | [`BlockCache::write`]         |
//! | `brelse(b)`          | [`BlockCache::release`] / drop |
//! | `bpin(b)`            | [`BlockCache::pin`]           |
//! | `bunpin(b)`          | [`BlockCache::unpin`] / drop  |
//!
//! 同一时刻只有一个执行流可以使用某个缓冲区，因此不要长时间持有。
//!
//! # 驱逐顺序
//!
//! 释放时记录的节拍越小越先被驱逐。初始化后所有缓冲区的时间戳都是 0，
//! 从未被释放过的缓冲区之间按扫描顺序（桶下标、桶内位置）先到先得，
//! 并不是严格的 LRU。

mod block_cache;
mod bucket;
mod buffer;

pub use block_cache::{BlockCache, BufInfo, CacheStats};
pub use buffer::{BufGuard, BufferId, PinnedBuf};
