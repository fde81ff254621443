use core::sync::atomic::{AtomicBool, Ordering};

use crate::error::ErrorCode;

/// Number of lock attempts per millisecond of timeout.
const SPINS_PER_MS: u32 = 1_000;

/// Exclusive write access to the object dictionary.
///
/// `acquire` must give up after roughly `timeout_ms` and report
/// [`ErrorCode::LockTimeout`] (or [`ErrorCode::LockFailure`] for any other
/// reason the lock cannot be taken).
pub trait ObjectLock {
    fn acquire(&self, timeout_ms: u32) -> Result<(), ErrorCode>;
    fn release(&self);
}

/// Spinning lock on an atomic flag, usable from interrupt context on MCUs.
#[derive(Debug, Default)]
pub struct SpinLock {
    locked: AtomicBool,
}

impl SpinLock {
    pub const fn new() -> Self {
        SpinLock { locked: AtomicBool::new(false) }
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }

    fn try_acquire(&self) -> bool {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }
}

impl ObjectLock for SpinLock {
    fn acquire(&self, timeout_ms: u32) -> Result<(), ErrorCode> {
        let attempts = timeout_ms.saturating_mul(SPINS_PER_MS).max(1);
        for _ in 0..attempts {
            if self.try_acquire() {
                return Ok(());
            }
            core::hint::spin_loop();
        }
        Err(ErrorCode::LockTimeout)
    }

    fn release(&self) {
        self.locked.store(false, Ordering::Release);
    }
}

/// Holds the lock until dropped.
pub struct ObjectLockGuard<'a> {
    lock: &'a dyn ObjectLock,
}

impl<'a> ObjectLockGuard<'a> {
    pub fn acquire(lock: &'a dyn ObjectLock, timeout_ms: u32) -> Result<Self, ErrorCode> {
        lock.acquire(timeout_ms)?;
        Ok(ObjectLockGuard { lock })
    }
}

impl Drop for ObjectLockGuard<'_> {
    fn drop(&mut self) {
        self.lock.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_releases_on_drop() {
        let lock = SpinLock::new();
        {
            let _guard = ObjectLockGuard::acquire(&lock, 1).unwrap();
            assert!(lock.is_locked());
        }
        assert!(!lock.is_locked());
    }

    #[test]
    fn test_held_lock_times_out() {
        let lock = SpinLock::new();
        let _guard = ObjectLockGuard::acquire(&lock, 1).unwrap();
        assert!(matches!(ObjectLockGuard::acquire(&lock, 1), Err(ErrorCode::LockTimeout)));
        assert!(lock.is_locked());
    }

    #[test]
    fn test_zero_timeout_still_tries_once() {
        let lock = SpinLock::new();
        assert_eq!(lock.acquire(0), Ok(()));
        assert_eq!(lock.acquire(0), Err(ErrorCode::LockTimeout));
        lock.release();
        assert_eq!(lock.acquire(0), Ok(()));
    }

    #[test]
    fn test_guard_released_on_early_return() {
        fn failing_write(lock: &SpinLock) -> Result<(), ErrorCode> {
            let _guard = ObjectLockGuard::acquire(lock, 1)?;
            Err(ErrorCode::IoFailure)
        }
        let lock = SpinLock::new();
        assert_eq!(failing_write(&lock), Err(ErrorCode::IoFailure));
        assert!(!lock.is_locked());
    }
}
