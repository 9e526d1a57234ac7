//! 同步原语
//!
//! 忙等锁直接使用 `spin::Mutex`；这里只提供可以跨 I/O 持有的睡眠锁。

mod sleeplock;

pub use sleeplock::{SleepLock, SleepLockGuard};
