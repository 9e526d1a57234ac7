//! 公共数据类型
//!
//! - [`BlockId`]：缓冲区标识 (设备号, 块号)
//! - [`CacheConfig`]：缓存尺寸配置

use crate::consts::{BSIZE, NBUCKET, NBUF};
use crate::error::{Error, ErrorKind, Result};
use core::fmt;

/// 缓冲区的标识：设备号 + 块号
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId {
    /// 设备号
    pub dev: u32,
    /// 块号
    pub blockno: u32,
}

impl BlockId {
    /// 创建标识
    pub const fn new(dev: u32, blockno: u32) -> Self {
        Self { dev, blockno }
    }

    /// 计算所属桶下标
    ///
    /// `(dev + blockno) % nbucket`，在 u64 上求和避免溢出。
    pub fn bucket(&self, nbucket: usize) -> usize {
        ((self.dev as u64 + self.blockno as u64) % nbucket as u64) as usize
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.dev, self.blockno)
    }
}

/// 缓存配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// 缓冲区数量
    pub nbuf: usize,
    /// 哈希桶数量（与缓冲区数量无关）
    pub nbucket: usize,
    /// 每个缓冲区的负载大小（字节）
    pub block_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            nbuf: NBUF,
            nbucket: NBUCKET,
            block_size: BSIZE,
        }
    }
}

impl CacheConfig {
    /// 检查配置是否可用
    pub fn validate(&self) -> Result<()> {
        if self.nbuf == 0 {
            return Err(Error::new(ErrorKind::InvalidInput, "Cache needs at least one buffer"));
        }
        if self.nbucket == 0 {
            return Err(Error::new(ErrorKind::InvalidInput, "Cache needs at least one bucket"));
        }
        if self.block_size == 0 {
            return Err(Error::new(ErrorKind::InvalidInput, "Block size must be non-zero"));
        }
        Ok(())
    }
}
