//! 缓冲区与访问句柄
//!
//! - [`Buf`]：一个缓冲区槽位，负载由睡眠锁保护
//! - [`BufGuard`]：持有缓冲区的凭证（引用计数 + 睡眠锁），丢弃即释放
//! - [`PinnedBuf`]：只持有引用计数的凭证，阻止缓冲区被驱逐

use super::block_cache::BlockCache;
use crate::block::BlockDevice;
use crate::error::{fatal, Fatal, Result};
use crate::hal::SystemHal;
use crate::sync::{SleepLock, SleepLockGuard};
use crate::types::BlockId;
use alloc::boxed::Box;
use alloc::vec;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, Ordering};

/// 缓冲区槽位下标
pub type BufferId = usize;

/// 缓冲区槽位
///
/// 初始化时创建，之后只会被回收复用，从不销毁。
pub(super) struct Buf<H> {
    /// 负载是否与磁盘一致
    ///
    /// 只在持有所属桶的锁时清除（回收），只在持有睡眠锁时置位（读入）。
    valid: AtomicBool,
    data: SleepLock<H, Box<[u8]>>,
}

impl<H: SystemHal> Buf<H> {
    pub fn new(block_size: usize) -> Self {
        Self {
            valid: AtomicBool::new(false),
            data: SleepLock::new(vec![0u8; block_size].into_boxed_slice()),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    pub fn set_valid(&self, valid: bool) {
        self.valid.store(valid, Ordering::Release);
    }

    pub fn lock(&self) -> SleepLockGuard<'_, H, Box<[u8]>> {
        self.data.lock()
    }

    pub fn holding(&self) -> bool {
        self.data.holding()
    }
}

/// 被持有的缓冲区
///
/// 由 [`BlockCache::read`] 或 [`BlockCache::get`] 返回。持有期间调用方独占负载，
/// 缓冲区的标识不会改变，也不会被驱逐。丢弃时等价于 [`BlockCache::release`]。
pub struct BufGuard<'a, D: BlockDevice, H: SystemHal> {
    cache: &'a BlockCache<D, H>,
    slot: BufferId,
    id: BlockId,
    data: Option<SleepLockGuard<'a, H, Box<[u8]>>>,
}

impl<'a, D: BlockDevice, H: SystemHal> BufGuard<'a, D, H> {
    pub(super) fn new(
        cache: &'a BlockCache<D, H>,
        slot: BufferId,
        id: BlockId,
        data: SleepLockGuard<'a, H, Box<[u8]>>,
    ) -> Self {
        Self {
            cache,
            slot,
            id,
            data: Some(data),
        }
    }

    /// 设备号
    pub fn dev(&self) -> u32 {
        self.id.dev
    }

    /// 块号
    pub fn blockno(&self) -> u32 {
        self.id.blockno
    }

    /// 标识
    pub fn block_id(&self) -> BlockId {
        self.id
    }

    /// 槽位下标
    pub fn slot(&self) -> BufferId {
        self.slot
    }

    /// 负载是否已从磁盘读入
    pub fn is_valid(&self) -> bool {
        self.cache.buf(self.slot).is_valid()
    }

    /// 标记负载有效
    ///
    /// 用于 [`BlockCache::get`] 取得的缓冲区：调用方整块覆盖负载后，
    /// 后续的 `read` 不必再访问磁盘。
    pub fn mark_valid(&mut self) {
        self.cache.buf(self.slot).set_valid(true);
    }

    /// 当前执行流是否持有此缓冲区的睡眠锁
    pub fn holding(&self) -> bool {
        self.data.is_some() && self.cache.buf(self.slot).holding()
    }

    /// 负载
    pub fn data(&self) -> &[u8] {
        match &self.data {
            Some(d) => &d[..],
            None => &[],
        }
    }

    /// 可变负载
    pub fn data_mut(&mut self) -> &mut [u8] {
        match &mut self.data {
            Some(d) => &mut d[..],
            None => &mut [],
        }
    }

    /// 写回磁盘，等价于 [`BlockCache::write`]
    pub fn write(&self) -> Result<()> {
        self.cache.write(self)
    }

    /// 在持有期间额外 pin 住缓冲区
    pub fn pin(&self) -> PinnedBuf<'a, D, H> {
        self.cache.pin(self)
    }

    /// 释放，等价于 [`BlockCache::release`]
    pub fn release(self) {}
}

impl<D: BlockDevice, H: SystemHal> Deref for BufGuard<'_, D, H> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.data()
    }
}

impl<D: BlockDevice, H: SystemHal> DerefMut for BufGuard<'_, D, H> {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.data_mut()
    }
}

impl<D: BlockDevice, H: SystemHal> Drop for BufGuard<'_, D, H> {
    fn drop(&mut self) {
        if let Some(data) = self.data.take() {
            if !data.holding() {
                fatal(Fatal::ReleaseNotHolding);
            }
            drop(data);
        }
        self.cache.unref(self.slot, self.id, true);
    }
}

impl<D: BlockDevice, H: SystemHal> core::fmt::Debug for BufGuard<'_, D, H> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BufGuard")
            .field("slot", &self.slot)
            .field("id", &self.id)
            .field("valid", &self.is_valid())
            .finish()
    }
}

/// 被 pin 住的缓冲区
///
/// 只占用一个引用计数，不持有睡眠锁，可以跨越多次 read/release 存活，
/// 也可以交给其他执行流释放。丢弃时等价于 [`BlockCache::unpin`]。
pub struct PinnedBuf<'a, D: BlockDevice, H: SystemHal> {
    cache: &'a BlockCache<D, H>,
    slot: BufferId,
    id: BlockId,
}

impl<'a, D: BlockDevice, H: SystemHal> PinnedBuf<'a, D, H> {
    pub(super) fn new(cache: &'a BlockCache<D, H>, slot: BufferId, id: BlockId) -> Self {
        Self { cache, slot, id }
    }

    /// 标识
    pub fn block_id(&self) -> BlockId {
        self.id
    }

    /// 槽位下标
    pub fn slot(&self) -> BufferId {
        self.slot
    }

    /// 解除 pin
    pub fn unpin(self) {}
}

impl<D: BlockDevice, H: SystemHal> core::fmt::Debug for PinnedBuf<'_, D, H> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PinnedBuf")
            .field("slot", &self.slot)
            .field("id", &self.id)
            .finish()
    }
}

impl<D: BlockDevice, H: SystemHal> Drop for PinnedBuf<'_, D, H> {
    fn drop(&mut self) {
        self.cache.unref(self.slot, self.id, false);
    }
}
