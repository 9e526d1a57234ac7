//! 块设备抽象
//!
//! block/device.rs 定义缓存所依赖的存储接口；
//! block/ramdisk.rs 提供一个内存盘实现，供宿主机环境与测试使用。

mod device;
mod ramdisk;

pub use device::BlockDevice;
pub use ramdisk::RamDisk;
