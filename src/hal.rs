//! 平台抽象层
//!
//! 缓存依赖内核提供的几项服务：时钟节拍、当前执行流标识、
//! 睡眠/唤醒。这些服务通过 [`SystemHal`] 注入，缓存本身不关心调度实现。

use spin::MutexGuard;

/// 内核服务接口
///
/// 所有方法都是关联函数，实现类型通常是零大小的标记类型。
///
/// # 示例
///
/// ```ignore
/// struct KernelHal;
/// impl SystemHal for KernelHal {
///     fn ticks() -> u64 { TICKS.load(Ordering::Relaxed) }
///     fn current_id() -> usize { myproc().pid }
///     fn sleep<T>(chan: usize, guard: MutexGuard<'_, T>) { proc::sleep(chan, guard) }
///     fn wakeup(chan: usize) { proc::wakeup(chan) }
/// }
/// ```
pub trait SystemHal {
    /// 单调不减的时钟节拍，用作空闲时间戳
    fn ticks() -> u64;

    /// 当前执行流（进程/线程）的标识，用于判断睡眠锁的持有者
    fn current_id() -> usize;

    /// 在 `chan` 上睡眠
    ///
    /// 实现必须在让出处理器的同时释放 `guard`，避免丢失唤醒。
    /// 允许虚假返回，调用方总会重新检查条件。
    fn sleep<T>(chan: usize, guard: MutexGuard<'_, T>);

    /// 唤醒所有睡眠在 `chan` 上的执行流
    fn wakeup(chan: usize);
}

#[cfg(any(test, feature = "std"))]
pub use std_hal::StdHal;

#[cfg(any(test, feature = "std"))]
mod std_hal {
    use super::SystemHal;
    use alloc::collections::BTreeMap;
    use alloc::vec::Vec;
    use spin::MutexGuard;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Mutex, MutexGuard as StdGuard, OnceLock, PoisonError};
    use std::thread::{self, Thread};
    use std::time::Instant;

    /// 宿主机线程上的实现
    ///
    /// 节拍取自进程启动后的纳秒数。睡眠的线程登记在 `chan` 上并 park，
    /// 直到 [`SystemHal::wakeup`] 把它们 unpark。
    #[derive(Debug, Clone, Copy, Default)]
    pub struct StdHal;

    /// 按通道登记的睡眠线程
    static SLEEPERS: Mutex<BTreeMap<usize, Vec<Thread>>> = Mutex::new(BTreeMap::new());

    fn sleepers() -> StdGuard<'static, BTreeMap<usize, Vec<Thread>>> {
        SLEEPERS.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 睡眠在 `chan` 上的线程数
    #[cfg(test)]
    pub(super) fn sleeping_on(chan: usize) -> usize {
        sleepers().get(&chan).map_or(0, Vec::len)
    }

    impl SystemHal for StdHal {
        fn ticks() -> u64 {
            static START: OnceLock<Instant> = OnceLock::new();
            START.get_or_init(Instant::now).elapsed().as_nanos() as u64
        }

        fn current_id() -> usize {
            static NEXT_ID: AtomicUsize = AtomicUsize::new(1);
            std::thread_local! {
                static ID: usize = NEXT_ID.fetch_add(1, Ordering::Relaxed);
            }
            ID.with(|id| *id)
        }

        fn sleep<T>(chan: usize, guard: MutexGuard<'_, T>) {
            // 先登记再放开条件锁：唤醒方必须拿到条件锁才能改变条件，
            // 之后的 wakeup 一定能看到这次登记；unpark 早于 park 时 park 立即返回
            sleepers().entry(chan).or_default().push(thread::current());
            drop(guard);
            thread::park();
        }

        fn wakeup(chan: usize) {
            let woken = sleepers().remove(&chan).unwrap_or_default();
            for sleeper in woken {
                sleeper.unpark();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_std_ticks_monotonic() {
        let a = StdHal::ticks();
        let b = StdHal::ticks();
        assert!(b >= a);
    }

    #[test]
    fn test_std_current_id_per_thread() {
        let here = StdHal::current_id();
        assert_eq!(here, StdHal::current_id());
        let there = std::thread::spawn(StdHal::current_id).join().unwrap();
        assert_ne!(here, there);
    }

    #[test]
    fn test_std_sleep_parks_until_wakeup() {
        let ready = spin::Mutex::new(false);
        let chan = &ready as *const _ as usize;

        thread::scope(|s| {
            let waiter = s.spawn(|| loop {
                let guard = ready.lock();
                if *guard {
                    break;
                }
                StdHal::sleep(chan, guard);
            });

            while std_hal::sleeping_on(chan) == 0 {
                thread::yield_now();
            }
            // 没有唤醒就一直停在通道上
            thread::sleep(Duration::from_millis(20));
            assert!(std_hal::sleeping_on(chan) >= 1);
            assert!(!waiter.is_finished());

            *ready.lock() = true;
            StdHal::wakeup(chan);
            waiter.join().unwrap();
        });

        assert_eq!(std_hal::sleeping_on(chan), 0);
    }

    #[test]
    fn test_std_wakeup_without_sleepers() {
        StdHal::wakeup(usize::MAX);
        assert_eq!(std_hal::sleeping_on(usize::MAX), 0);
    }
}
