//! 哈希桶
//!
//! 每个桶持有一组缓冲区的目录项。目录项记录缓冲区的标识、引用计数和
//! 空闲时间戳，这些字段只在持有所在桶的锁时读写；缓冲区在桶之间迁移时，
//! 目录项整体移动。

use super::buffer::BufferId;
use crate::types::BlockId;
use alloc::vec::Vec;

/// 目录项
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct Entry {
    /// 缓冲区槽位
    pub slot: BufferId,
    /// 当前标识；从未使用过的缓冲区没有标识
    pub id: Option<BlockId>,
    /// 引用计数（持有者 + pin）
    pub refcnt: u32,
    /// 引用计数最近一次降为 0 时的节拍
    pub timestamp: u64,
}

impl Entry {
    pub fn new(slot: BufferId) -> Self {
        Self {
            slot,
            id: None,
            refcnt: 0,
            timestamp: 0,
        }
    }

    /// 是否可以被驱逐
    pub fn is_idle(&self) -> bool {
        self.refcnt == 0
    }
}

/// 哈希桶中的缓冲区序列
pub(super) struct Bucket {
    entries: Vec<Entry>,
}

impl Bucket {
    /// 预留 `capacity` 个位置，之后的链接操作不再分配内存
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn entry_mut(&mut self, pos: usize) -> &mut Entry {
        &mut self.entries[pos]
    }

    /// 查找标识为 `id` 的目录项
    pub fn find(&self, id: BlockId) -> Option<usize> {
        self.entries.iter().position(|e| e.id == Some(id))
    }

    /// 查找槽位为 `slot` 且标识为 `id` 的目录项
    pub fn find_slot(&self, slot: BufferId, id: BlockId) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.slot == slot && e.id == Some(id))
    }

    /// 链接到尾部（初始化）
    pub fn push(&mut self, entry: Entry) {
        self.entries.push(entry);
    }

    /// 链接到头部（迁移进来的缓冲区）
    pub fn link_front(&mut self, entry: Entry) {
        self.entries.insert(0, entry);
    }

    /// 摘除目录项，其余项保持原有顺序
    pub fn unlink(&mut self, pos: usize) -> Entry {
        self.entries.remove(pos)
    }

    /// 在本桶中寻找驱逐候选
    ///
    /// 返回第一个空闲、且时间戳严格小于 `bound` 以及本桶中更早遇到的
    /// 候选的目录项位置。`bound` 为此前各桶中的最优时间戳。
    pub fn lru_candidate(&self, bound: Option<u64>) -> Option<usize> {
        let mut best: Option<(usize, u64)> = None;
        for (pos, entry) in self.entries.iter().enumerate() {
            if !entry.is_idle() {
                continue;
            }
            let limit = best.map(|(_, ts)| ts).or(bound);
            if limit.map_or(true, |ts| entry.timestamp < ts) {
                best = Some((pos, entry.timestamp));
            }
        }
        best.map(|(pos, _)| pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idle(slot: usize, ts: u64) -> Entry {
        Entry {
            slot,
            id: Some(BlockId::new(1, slot as u32)),
            refcnt: 0,
            timestamp: ts,
        }
    }

    #[test]
    fn test_find() {
        let mut bucket = Bucket::with_capacity(4);
        bucket.push(Entry::new(0));
        bucket.push(idle(1, 5));

        assert_eq!(bucket.find(BlockId::new(1, 1)), Some(1));
        assert_eq!(bucket.find(BlockId::new(1, 0)), None);
        assert_eq!(bucket.find_slot(1, BlockId::new(1, 1)), Some(1));
        assert_eq!(bucket.find_slot(0, BlockId::new(1, 1)), None);
    }

    #[test]
    fn test_lru_candidate_picks_oldest() {
        let mut bucket = Bucket::with_capacity(4);
        bucket.push(idle(0, 30));
        bucket.push(idle(1, 10));
        bucket.push(idle(2, 20));

        assert_eq!(bucket.lru_candidate(None), Some(1));
        // 必须严格小于已有的最优值
        assert_eq!(bucket.lru_candidate(Some(10)), None);
        assert_eq!(bucket.lru_candidate(Some(11)), Some(1));
    }

    #[test]
    fn test_lru_candidate_ties_keep_first() {
        let mut bucket = Bucket::with_capacity(4);
        for slot in 0..3 {
            bucket.push(Entry::new(slot));
        }
        assert_eq!(bucket.lru_candidate(None), Some(0));
    }

    #[test]
    fn test_lru_candidate_skips_referenced() {
        let mut bucket = Bucket::with_capacity(4);
        bucket.push(idle(0, 1));
        bucket.push(idle(1, 2));
        bucket.entry_mut(0).refcnt = 1;

        assert_eq!(bucket.lru_candidate(None), Some(1));
        bucket.entry_mut(1).refcnt = 2;
        assert_eq!(bucket.lru_candidate(None), None);
    }

    #[test]
    fn test_link_and_unlink_preserve_order() {
        let mut bucket = Bucket::with_capacity(4);
        bucket.push(Entry::new(0));
        bucket.push(Entry::new(1));
        bucket.push(Entry::new(2));

        let moved = bucket.unlink(1);
        assert_eq!(moved.slot, 1);
        let slots: Vec<_> = bucket.entries().iter().map(|e| e.slot).collect();
        assert_eq!(slots, [0, 2]);

        bucket.link_front(moved);
        let slots: Vec<_> = bucket.entries().iter().map(|e| e.slot).collect();
        assert_eq!(slots, [1, 0, 2]);
        assert_eq!(bucket.len(), 3);
    }
}
