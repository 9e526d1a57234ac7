//! 块设备接口

use crate::error::Result;

/// 块设备接口
///
/// 缓存通过此 trait 完成块传输。多个执行流可能同时对不同缓冲区发起传输，
/// 所以方法接收 `&self`，设备内部自行串行化（例如驱动自身的队列锁）。
///
/// 每次调用都是同步的：返回时传输已经完成。调用期间缓存只持有
/// 对应缓冲区的睡眠锁，不持有任何自旋锁。
///
/// # 示例
///
/// ```rust,ignore
/// use bcache_core::{BlockDevice, Result};
///
/// struct VirtioDisk { /* ... */ }
///
/// impl BlockDevice for VirtioDisk {
///     fn read_block(&self, dev: u32, blockno: u32, buf: &mut [u8]) -> Result<()> {
///         self.submit(dev, blockno, buf.as_mut_ptr(), false)
///     }
///
///     fn write_block(&self, dev: u32, blockno: u32, buf: &[u8]) -> Result<()> {
///         self.submit(dev, blockno, buf.as_ptr() as *mut u8, true)
///     }
/// }
/// ```
pub trait BlockDevice: Sync {
    /// 将块 `(dev, blockno)` 读入 `buf`
    ///
    /// `buf` 的长度等于缓存配置的块大小。
    fn read_block(&self, dev: u32, blockno: u32, buf: &mut [u8]) -> Result<()>;

    /// 将 `buf` 写入块 `(dev, blockno)`
    fn write_block(&self, dev: u32, blockno: u32, buf: &[u8]) -> Result<()>;
}
