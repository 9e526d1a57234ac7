//! 块缓存实现
//!
//! # 结构
//!
//! ```text
//! struct BlockCache {
//!     evict_lock: Mutex<()>,            // 全局驱逐锁，只在未命中时获取
//!     buckets: Vec<Mutex<Bucket>>,      // 哈希桶，保护目录项（标识/引用计数/时间戳）
//!     bufs: Vec<Buf>,                   // 缓冲区槽位，负载由各自的睡眠锁保护
//! }
//! ```
//!
//! # 加锁规则
//!
//! - 命中路径只获取目标桶的锁；
//! - 未命中路径先获取驱逐锁，再按桶下标递增的顺序获取桶锁，
//!   同一时刻最多持有两把桶锁（当前最优候选所在的桶 + 正在扫描的桶）；
//! - 任何自旋锁都不会跨越睡眠锁的获取或块设备传输。
//!
//! 所有未命中处理都被驱逐锁串行化，加上固定的扫描顺序，保证不会出现锁环。

use super::bucket::{Bucket, Entry};
use super::buffer::{Buf, BufGuard, BufferId, PinnedBuf};
use crate::block::BlockDevice;
use crate::error::{fatal, Fatal, Result};
use crate::hal::SystemHal;
use crate::types::{BlockId, CacheConfig};
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU64, Ordering};
use spin::{Mutex, MutexGuard};

/// 缓存统计信息
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// 命中路径上的命中次数
    pub hits: u64,
    /// 获取驱逐锁后二次检查时的命中次数
    pub recheck_hits: u64,
    /// 未命中（回收缓冲区）次数
    pub misses: u64,
    /// 回收时缓冲区跨桶迁移的次数
    pub relinks: u64,
    /// 物理读次数
    pub reads: u64,
    /// 物理写次数
    pub writes: u64,
}

impl CacheStats {
    /// 总查找次数
    pub fn lookups(&self) -> u64 {
        self.hits + self.recheck_hits + self.misses
    }

    /// 计算命中率
    pub fn hit_rate(&self) -> f64 {
        let total = self.lookups();
        if total == 0 {
            0.0
        } else {
            (self.hits + self.recheck_hits) as f64 / total as f64
        }
    }
}

#[derive(Default)]
struct AtomicStats {
    hits: AtomicU64,
    recheck_hits: AtomicU64,
    misses: AtomicU64,
    relinks: AtomicU64,
    reads: AtomicU64,
    writes: AtomicU64,
}

impl AtomicStats {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            recheck_hits: self.recheck_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            relinks: self.relinks.load(Ordering::Relaxed),
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
        }
    }
}

/// 某个缓冲区在目录中的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufInfo {
    /// 槽位下标
    pub slot: BufferId,
    /// 所在桶下标
    pub bucket: usize,
    /// 当前标识
    pub id: Option<BlockId>,
    /// 引用计数
    pub refcnt: u32,
    /// 空闲时间戳
    pub timestamp: u64,
    /// 负载是否有效
    pub valid: bool,
}

/// 驱逐扫描中的当前最优候选，持有其所在桶的锁
struct Victim<'a> {
    bucket: usize,
    guard: MutexGuard<'a, Bucket>,
    pos: usize,
    timestamp: u64,
}

/// 块缓存
///
/// 固定数量的缓冲区分布在固定数量的哈希桶中。缓冲区在初始化时按
/// 下标轮转分配到各桶，之后只在回收时迁移。
///
/// # 示例
///
/// ```rust,ignore
/// let cache: BlockCache<_, KernelHal> = BlockCache::new(disk, CacheConfig::default())?;
///
/// let mut buf = cache.read(ROOTDEV, 1)?;
/// buf.data_mut()[0] = 0x42;
/// buf.write()?;
/// drop(buf); // brelse
/// ```
pub struct BlockCache<D: BlockDevice, H: SystemHal> {
    device: D,
    config: CacheConfig,
    evict_lock: Mutex<()>,
    buckets: Vec<Mutex<Bucket>>,
    bufs: Vec<Buf<H>>,
    stats: AtomicStats,
}

impl<D: BlockDevice, H: SystemHal> BlockCache<D, H> {
    /// 创建块缓存
    ///
    /// 第 `i` 个缓冲区追加到第 `i % nbucket` 个桶的末尾，桶内按下标递增排列。
    /// xv6 的 `binit` 是头插，桶内顺序相反；两者只影响从未释放过的缓冲区
    /// 被回收的先后。所有缓冲区初始无效、引用计数与时间戳为 0。不发生任何 I/O。
    ///
    /// # 错误
    ///
    /// 配置中任一尺寸为 0 时返回 `InvalidInput`。
    pub fn new(device: D, config: CacheConfig) -> Result<Self> {
        config.validate()?;

        let mut buckets: Vec<Bucket> = (0..config.nbucket)
            .map(|_| Bucket::with_capacity(config.nbuf))
            .collect();
        for slot in 0..config.nbuf {
            buckets[slot % config.nbucket].push(Entry::new(slot));
        }

        log::info!(
            "[BCACHE] init: {} buffers x {} bytes in {} buckets",
            config.nbuf,
            config.block_size,
            config.nbucket
        );

        Ok(Self {
            device,
            config,
            evict_lock: Mutex::new(()),
            buckets: buckets.into_iter().map(Mutex::new).collect(),
            bufs: (0..config.nbuf).map(|_| Buf::new(config.block_size)).collect(),
            stats: AtomicStats::default(),
        })
    }

    /// 读取块，返回被持有的缓冲区
    ///
    /// 只有缓冲区无效时才访问设备；已有效的缓冲区直接返回。
    ///
    /// # 错误
    ///
    /// 设备读失败时返回其错误，缓冲区保持无效并被释放。
    #[doc(alias = "bread")]
    pub fn read(&self, dev: u32, blockno: u32) -> Result<BufGuard<'_, D, H>> {
        let mut buf = self.bget(BlockId::new(dev, blockno));
        if !buf.is_valid() {
            self.device.read_block(dev, blockno, buf.data_mut())?;
            self.bufs[buf.slot()].set_valid(true);
            AtomicStats::bump(&self.stats.reads);
        }
        Ok(buf)
    }

    /// 取得块对应的缓冲区但不读入负载
    ///
    /// 返回的缓冲区可能无效；调用方整块覆盖负载后可调用
    /// [`BufGuard::mark_valid`]。
    pub fn get(&self, dev: u32, blockno: u32) -> BufGuard<'_, D, H> {
        self.bget(BlockId::new(dev, blockno))
    }

    /// 将缓冲区负载写回磁盘
    ///
    /// 调用方必须持有缓冲区的睡眠锁，否则终止。
    /// 不改变有效位、引用计数，也不释放缓冲区。
    #[doc(alias = "bwrite")]
    pub fn write(&self, buf: &BufGuard<'_, D, H>) -> Result<()> {
        if !buf.holding() {
            fatal(Fatal::WriteNotHolding);
        }
        self.device.write_block(buf.dev(), buf.blockno(), buf.data())?;
        AtomicStats::bump(&self.stats.writes);
        Ok(())
    }

    /// 释放缓冲区
    ///
    /// 先释放睡眠锁，再在所属桶的锁下递减引用计数；降为 0 时记录当前节拍。
    #[doc(alias = "brelse")]
    pub fn release(&self, buf: BufGuard<'_, D, H>) {
        drop(buf);
    }

    /// pin 住缓冲区，使其在释放之后仍不可被驱逐
    #[doc(alias = "bpin")]
    pub fn pin<'a>(&'a self, buf: &BufGuard<'a, D, H>) -> PinnedBuf<'a, D, H> {
        let id = buf.block_id();
        let mut bucket = self.buckets[self.bucket_of(id)].lock();
        let pos = match bucket.find_slot(buf.slot(), id) {
            Some(pos) => pos,
            None => fatal(Fatal::NotLinked),
        };
        bucket.entry_mut(pos).refcnt += 1;
        PinnedBuf::new(self, buf.slot(), id)
    }

    /// 解除 pin
    #[doc(alias = "bunpin")]
    pub fn unpin(&self, pinned: PinnedBuf<'_, D, H>) {
        drop(pinned);
    }

    /// 缓存统计信息
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }

    /// 缓存配置
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// 底层设备
    pub fn device(&self) -> &D {
        &self.device
    }

    /// 各缓冲区在目录中的状态，按桶下标、桶内顺序排列
    ///
    /// 持有驱逐锁进行，期间不会有缓冲区迁移，因此每个槽位恰好出现一次。
    pub fn snapshot(&self) -> Vec<BufInfo> {
        let _evict = self.evict_lock.lock();
        let mut infos = Vec::with_capacity(self.bufs.len());
        for (index, lock) in self.buckets.iter().enumerate() {
            let bucket = lock.lock();
            for entry in bucket.entries() {
                infos.push(BufInfo {
                    slot: entry.slot,
                    bucket: index,
                    id: entry.id,
                    refcnt: entry.refcnt,
                    timestamp: entry.timestamp,
                    valid: self.bufs[entry.slot].is_valid(),
                });
            }
        }
        infos
    }

    pub(super) fn buf(&self, slot: BufferId) -> &Buf<H> {
        &self.bufs[slot]
    }

    fn bucket_of(&self, id: BlockId) -> usize {
        id.bucket(self.buckets.len())
    }

    /// 查找或回收缓冲区，返回时调用方持有其睡眠锁，引用计数已加一
    fn bget(&self, id: BlockId) -> BufGuard<'_, D, H> {
        let target = self.bucket_of(id);

        // 命中路径：只碰目标桶
        {
            let mut bucket = self.buckets[target].lock();
            if let Some(pos) = bucket.find(id) {
                let entry = bucket.entry_mut(pos);
                entry.refcnt += 1;
                let slot = entry.slot;
                drop(bucket);
                AtomicStats::bump(&self.stats.hits);
                log::trace!("[BCACHE] bget {} HIT slot={}", id, slot);
                return self.hold(slot, id);
            }
        }

        let evict = self.evict_lock.lock();

        // 释放桶锁到获取驱逐锁之间，其他执行流可能已经缓存了同一个块
        {
            let mut bucket = self.buckets[target].lock();
            if let Some(pos) = bucket.find(id) {
                let entry = bucket.entry_mut(pos);
                entry.refcnt += 1;
                let slot = entry.slot;
                drop(bucket);
                drop(evict);
                AtomicStats::bump(&self.stats.recheck_hits);
                log::trace!("[BCACHE] bget {} HIT on recheck slot={}", id, slot);
                return self.hold(slot, id);
            }
        }

        let victim = self.select_victim();
        let (mut bucket, pos) = if victim.bucket != target {
            let Victim { bucket: from, mut guard, pos, .. } = victim;
            let entry = guard.unlink(pos);
            drop(guard);
            let mut bucket = self.buckets[target].lock();
            bucket.link_front(entry);
            AtomicStats::bump(&self.stats.relinks);
            log::debug!("[BCACHE] relink slot={} bucket {} -> {}", entry.slot, from, target);
            (bucket, 0)
        } else {
            (victim.guard, victim.pos)
        };

        let entry = bucket.entry_mut(pos);
        let old = entry.id.replace(id);
        entry.refcnt = 1;
        let slot = entry.slot;
        self.bufs[slot].set_valid(false);
        drop(bucket);
        drop(evict);

        AtomicStats::bump(&self.stats.misses);
        match old {
            Some(old) => log::debug!("[BCACHE] bget {} MISS, evicted {} from slot={}", id, old, slot),
            None => log::debug!("[BCACHE] bget {} MISS, fresh slot={}", id, slot),
        }
        self.hold(slot, id)
    }

    /// 全局近似 LRU：在所有桶中找时间戳最小的空闲缓冲区
    ///
    /// 调用方必须持有驱逐锁。返回时仍持有候选所在桶的锁。
    /// 时间戳相同时保留先遇到的（桶下标小、桶内靠前）。
    fn select_victim(&self) -> Victim<'_> {
        let mut best: Option<Victim<'_>> = None;
        for (index, lock) in self.buckets.iter().enumerate() {
            let bucket = lock.lock();
            let bound = best.as_ref().map(|v| v.timestamp);
            match bucket.lru_candidate(bound) {
                Some(pos) => {
                    let timestamp = bucket.entries()[pos].timestamp;
                    // 先拿到新桶的锁，赋值时才放掉上一个候选所在的桶
                    best = Some(Victim {
                        bucket: index,
                        guard: bucket,
                        pos,
                        timestamp,
                    });
                }
                None => drop(bucket),
            }
        }
        match best {
            Some(victim) => victim,
            None => fatal(Fatal::NoBuffers),
        }
    }

    fn hold(&self, slot: BufferId, id: BlockId) -> BufGuard<'_, D, H> {
        let data = self.bufs[slot].lock();
        BufGuard::new(self, slot, id, data)
    }

    /// 在所属桶的锁下递减引用计数
    ///
    /// `stamp` 为真时（release），计数降为 0 则记录当前节拍。
    pub(super) fn unref(&self, slot: BufferId, id: BlockId, stamp: bool) {
        let mut bucket = self.buckets[self.bucket_of(id)].lock();
        let pos = match bucket.find_slot(slot, id) {
            Some(pos) => pos,
            None => fatal(Fatal::NotLinked),
        };
        let entry = bucket.entry_mut(pos);
        if entry.refcnt == 0 {
            fatal(Fatal::RefcntUnderflow);
        }
        entry.refcnt -= 1;
        if stamp && entry.refcnt == 0 {
            entry.timestamp = H::ticks();
            log::trace!("[BCACHE] brelse {} idle at {}", id, entry.timestamp);
        }
    }
}

impl<D: BlockDevice, H: SystemHal> core::fmt::Debug for BlockCache<D, H> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BlockCache")
            .field("config", &self.config)
            .field("stats", &self.stats.snapshot())
            .finish()
    }
}
