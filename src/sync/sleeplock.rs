//! 睡眠锁
//!
//! 锁被占用时等待者通过 [`SystemHal::sleep`] 让出处理器，而不是忙等，
//! 因此可以在持有期间执行阻塞的块设备传输。
//!
//! 内部状态（是否上锁、持有者）由一把短临界区的自旋锁保护，
//! 持有者记录使 [`SleepLock::holding`] 可以回答“当前执行流是否持有此锁”。

use crate::hal::SystemHal;
use core::cell::UnsafeCell;
use core::marker::PhantomData;
use core::ops::{Deref, DerefMut};

/// 睡眠锁
pub struct SleepLock<H, T: ?Sized> {
    /// 持有者标识，`None` 表示未上锁
    owner: spin::Mutex<Option<usize>>,
    _hal: PhantomData<fn() -> H>,
    data: UnsafeCell<T>,
}

unsafe impl<H, T: ?Sized + Send> Sync for SleepLock<H, T> {}

impl<H, T> SleepLock<H, T> {
    /// 创建未上锁的睡眠锁
    pub fn new(data: T) -> Self {
        Self {
            owner: spin::Mutex::new(None),
            _hal: PhantomData,
            data: UnsafeCell::new(data),
        }
    }
}

impl<H: SystemHal, T: ?Sized> SleepLock<H, T> {
    /// 获取锁，必要时睡眠等待
    pub fn lock(&self) -> SleepLockGuard<'_, H, T> {
        let me = H::current_id();
        loop {
            let mut owner = self.owner.lock();
            if owner.is_none() {
                *owner = Some(me);
                break;
            }
            H::sleep(self.chan(), owner);
        }
        SleepLockGuard {
            lock: self,
            _not_send: PhantomData,
        }
    }

    /// 当前执行流是否持有此锁
    pub fn holding(&self) -> bool {
        *self.owner.lock() == Some(H::current_id())
    }

    /// 是否被任意执行流持有
    pub fn is_locked(&self) -> bool {
        self.owner.lock().is_some()
    }

    fn unlock(&self) {
        *self.owner.lock() = None;
        H::wakeup(self.chan());
    }

    fn chan(&self) -> usize {
        self as *const Self as *const () as usize
    }
}

/// 睡眠锁守卫
///
/// 持有者身份绑定到获取锁的执行流，所以守卫不能跨线程移动。
pub struct SleepLockGuard<'a, H: SystemHal, T: ?Sized> {
    lock: &'a SleepLock<H, T>,
    _not_send: PhantomData<*const ()>,
}

impl<'a, H: SystemHal, T: ?Sized> SleepLockGuard<'a, H, T> {
    /// 当前执行流是否仍是持有者
    pub fn holding(&self) -> bool {
        self.lock.holding()
    }
}

impl<'a, H: SystemHal, T: ?Sized> Deref for SleepLockGuard<'a, H, T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { &*self.lock.data.get() }
    }
}

impl<'a, H: SystemHal, T: ?Sized> DerefMut for SleepLockGuard<'a, H, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<'a, H: SystemHal, T: ?Sized> Drop for SleepLockGuard<'a, H, T> {
    fn drop(&mut self) {
        self.lock.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::StdHal;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    #[test]
    fn test_lock_and_holding() {
        let lock: SleepLock<StdHal, u32> = SleepLock::new(7);
        assert!(!lock.is_locked());
        assert!(!lock.holding());

        {
            let mut guard = lock.lock();
            assert!(guard.holding());
            assert!(lock.is_locked());
            *guard += 1;
        }

        assert!(!lock.is_locked());
        assert_eq!(*lock.lock(), 8);
    }

    #[test]
    fn test_holding_is_per_thread() {
        let lock: SleepLock<StdHal, ()> = SleepLock::new(());
        let _guard = lock.lock();
        thread::scope(|s| {
            let other = s.spawn(|| lock.holding()).join().unwrap();
            assert!(!other);
        });
        assert!(lock.holding());
    }

    #[test]
    fn test_waiter_blocks_until_release() {
        let lock: SleepLock<StdHal, u32> = SleepLock::new(0);
        let released = AtomicBool::new(false);

        thread::scope(|s| {
            let guard = lock.lock();
            let waiter = s.spawn(|| {
                let mut g = lock.lock();
                // 只有在持有者释放之后才能拿到锁
                assert!(released.load(Ordering::SeqCst));
                *g += 1;
            });
            thread::sleep(std::time::Duration::from_millis(20));
            released.store(true, Ordering::SeqCst);
            drop(guard);
            waiter.join().unwrap();
        });

        assert_eq!(*lock.lock(), 1);
    }

    #[test]
    fn test_mutual_exclusion() {
        let lock: SleepLock<StdHal, u64> = SleepLock::new(0);
        thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..1000 {
                        *lock.lock() += 1;
                    }
                });
            }
        });
        assert_eq!(*lock.lock(), 4000);
    }
}
