//! 内存盘
//!
//! 以内存模拟多个块设备，设备号首次被访问时按零填充创建。

use super::BlockDevice;
use crate::error::{Error, ErrorKind, Result};
use alloc::collections::BTreeMap;
use alloc::vec;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU64, Ordering};

/// 内存盘
///
/// 记录物理读写次数，便于观察缓存实际省下的传输。
pub struct RamDisk {
    block_size: usize,
    nblocks: u32,
    disks: spin::Mutex<BTreeMap<u32, Vec<u8>>>,
    reads: AtomicU64,
    writes: AtomicU64,
}

impl RamDisk {
    /// 创建内存盘
    ///
    /// # 参数
    ///
    /// * `block_size` - 块大小（字节）
    /// * `nblocks` - 每个设备的块数
    pub fn new(block_size: usize, nblocks: u32) -> Self {
        Self {
            block_size,
            nblocks,
            disks: spin::Mutex::new(BTreeMap::new()),
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
        }
    }

    /// 块大小
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// 每个设备的块数
    pub fn nblocks(&self) -> u32 {
        self.nblocks
    }

    /// 物理读次数
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// 物理写次数
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// 直接写入块内容（不计入写次数），用于准备磁盘镜像
    pub fn load(&self, dev: u32, blockno: u32, data: &[u8]) -> Result<()> {
        let range = self.range(blockno, data.len())?;
        let mut disks = self.disks.lock();
        let disk = self.disk_mut(&mut disks, dev);
        disk[range].copy_from_slice(data);
        Ok(())
    }

    /// 直接读取块内容（不计入读次数）
    pub fn peek(&self, dev: u32, blockno: u32) -> Result<Vec<u8>> {
        let range = self.range(blockno, self.block_size)?;
        let disks = self.disks.lock();
        Ok(match disks.get(&dev) {
            Some(disk) => disk[range].to_vec(),
            None => vec![0u8; self.block_size],
        })
    }

    fn range(&self, blockno: u32, len: usize) -> Result<core::ops::Range<usize>> {
        if blockno >= self.nblocks {
            return Err(Error::new(ErrorKind::OutOfRange, "Block number beyond end of ramdisk"));
        }
        if len != self.block_size {
            return Err(Error::new(ErrorKind::InvalidInput, "Transfer size must equal block size"));
        }
        let start = blockno as usize * self.block_size;
        Ok(start..start + len)
    }

    fn disk_mut<'a>(&self, disks: &'a mut BTreeMap<u32, Vec<u8>>, dev: u32) -> &'a mut Vec<u8> {
        let size = self.nblocks as usize * self.block_size;
        disks.entry(dev).or_insert_with(|| vec![0u8; size])
    }
}

impl BlockDevice for RamDisk {
    fn read_block(&self, dev: u32, blockno: u32, buf: &mut [u8]) -> Result<()> {
        let range = self.range(blockno, buf.len())?;
        {
            let disks = self.disks.lock();
            match disks.get(&dev) {
                Some(disk) => buf.copy_from_slice(&disk[range]),
                None => buf.fill(0),
            }
        }
        self.reads.fetch_add(1, Ordering::Relaxed);
        log::trace!("[RAMDISK] read {}:{}", dev, blockno);
        Ok(())
    }

    fn write_block(&self, dev: u32, blockno: u32, buf: &[u8]) -> Result<()> {
        let range = self.range(blockno, buf.len())?;
        {
            let mut disks = self.disks.lock();
            let disk = self.disk_mut(&mut disks, dev);
            disk[range].copy_from_slice(buf);
        }
        self.writes.fetch_add(1, Ordering::Relaxed);
        log::trace!("[RAMDISK] write {}:{}", dev, blockno);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unwritten_block_reads_zero() {
        let disk = RamDisk::new(512, 8);
        let mut buf = vec![0xAAu8; 512];
        disk.read_block(1, 3, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0));
        assert_eq!(disk.reads(), 1);
    }

    #[test]
    fn test_write_then_read() {
        let disk = RamDisk::new(512, 8);
        let data = vec![0x5Au8; 512];
        disk.write_block(2, 7, &data).unwrap();
        assert_eq!(disk.writes(), 1);

        let mut buf = vec![0u8; 512];
        disk.read_block(2, 7, &mut buf).unwrap();
        assert_eq!(buf, data);

        // 其他设备不受影响
        assert!(disk.peek(1, 7).unwrap().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_load_and_peek_skip_counters() {
        let disk = RamDisk::new(16, 4);
        disk.load(1, 0, &[9u8; 16]).unwrap();
        assert_eq!(disk.peek(1, 0).unwrap(), vec![9u8; 16]);
        assert_eq!(disk.reads(), 0);
        assert_eq!(disk.writes(), 0);
    }

    #[test]
    fn test_out_of_range() {
        let disk = RamDisk::new(16, 4);
        assert_eq!(disk.block_size(), 16);
        assert_eq!(disk.nblocks(), 4);
        let mut buf = [0u8; 16];
        let err = disk.read_block(1, 4, &mut buf).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutOfRange);

        let err = disk.write_block(1, 0, &[0u8; 8]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
}
