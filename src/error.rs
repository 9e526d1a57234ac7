//! 错误类型定义
//!
//! 区分两类错误：
//! - [`Error`]：可恢复错误（存储设备 I/O 失败、配置无效），通过 `Result` 返回；
//! - [`Fatal`]：不变量被破坏（程序错误、容量耗尽），通过 [`fatal`] 直接终止。

use core::fmt;

/// 缓存操作错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    kind: ErrorKind,
    message: &'static str,
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// I/O 错误
    Io,
    /// 无效参数
    InvalidInput,
    /// 块号超出设备范围
    OutOfRange,
}

impl Error {
    /// 创建新错误
    pub const fn new(kind: ErrorKind, message: &'static str) -> Self {
        Self { kind, message }
    }

    /// 获取错误类型
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// 获取错误消息
    pub const fn message(&self) -> &'static str {
        self.message
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result 类型别名
pub type Result<T> = core::result::Result<T, Error>;

/// 不可恢复的错误
///
/// 这些情况表示调用方违反了缓存协议，或者缓存容量规划有误，
/// 不存在降级路径。每个变体的 `Display` 输出即 panic 消息。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fatal {
    /// 写回时调用方未持有缓冲区的睡眠锁
    WriteNotHolding,
    /// 释放时调用方未持有缓冲区的睡眠锁
    ReleaseNotHolding,
    /// 所有缓冲区都被引用，找不到可驱逐的缓冲区
    NoBuffers,
    /// 引用计数将变为负数
    RefcntUnderflow,
    /// 缓冲区不在其标识对应的桶中
    NotLinked,
}

impl fmt::Display for Fatal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Fatal::WriteNotHolding => "bwrite: buffer not locked by caller",
            Fatal::ReleaseNotHolding => "brelse: buffer not locked by caller",
            Fatal::NoBuffers => "bget: no buffers",
            Fatal::RefcntUnderflow => "bunpin: refcnt underflow",
            Fatal::NotLinked => "bcache: buffer not linked under its bucket",
        };
        f.write_str(msg)
    }
}

/// 记录并终止
#[cold]
#[track_caller]
pub fn fatal(reason: Fatal) -> ! {
    log::error!("[BCACHE] fatal: {}", reason);
    panic!("{}", reason)
}
