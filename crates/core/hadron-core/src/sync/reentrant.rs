//! Owner-tagged, depth-counted spin lock.
//!
//! The holder may acquire the lock again without deadlocking; the lock is
//! released only when the outermost guard is dropped. Callers identify
//! themselves with an opaque owner token (typically the OS thread id), so
//! the lock works without any notion of a current task.

use core::marker::PhantomData;
use core::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Owner value meaning "unlocked".
const NO_OWNER: u64 = u64::MAX;

/// A re-entrant spin lock guarding a critical section rather than data.
pub struct ReentrantLock {
    owner: AtomicU64,
    /// Nesting depth. Only written by the current owner.
    depth: AtomicUsize,
    /// Total number of successful `lock` calls, nested ones included.
    acquisitions: AtomicU64,
}

impl ReentrantLock {
    /// Creates a new unlocked `ReentrantLock`.
    pub const fn new() -> Self {
        Self {
            owner: AtomicU64::new(NO_OWNER),
            depth: AtomicUsize::new(0),
            acquisitions: AtomicU64::new(0),
        }
    }

    /// Acquires the lock on behalf of `owner`, spinning while another owner
    /// holds it.
    ///
    /// # Panics
    ///
    /// Panics if `owner` is `u64::MAX`, which is reserved for "unlocked".
    pub fn lock(&self, owner: u64) -> ReentrantLockGuard<'_> {
        assert_ne!(owner, NO_OWNER, "reserved owner token");

        if self.owner.load(Ordering::Acquire) != owner {
            loop {
                if self
                    .owner
                    .compare_exchange_weak(NO_OWNER, owner, Ordering::Acquire, Ordering::Relaxed)
                    .is_ok()
                {
                    break;
                }
                while self.owner.load(Ordering::Relaxed) != NO_OWNER {
                    core::hint::spin_loop();
                }
            }
        }

        self.depth.fetch_add(1, Ordering::Relaxed);
        self.acquisitions.fetch_add(1, Ordering::Relaxed);
        ReentrantLockGuard {
            lock: self,
            _not_send: PhantomData,
        }
    }

    /// Returns `true` if any owner currently holds the lock.
    pub fn is_locked(&self) -> bool {
        self.owner.load(Ordering::Relaxed) != NO_OWNER
    }

    /// Returns `true` if `owner` currently holds the lock.
    pub fn is_held_by(&self, owner: u64) -> bool {
        owner != NO_OWNER && self.owner.load(Ordering::Relaxed) == owner
    }

    /// Returns the current nesting depth (zero when unlocked).
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    /// Returns how many times the lock has been acquired since creation.
    pub fn acquisitions(&self) -> u64 {
        self.acquisitions.load(Ordering::Relaxed)
    }
}

impl Default for ReentrantLock {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard for one level of a [`ReentrantLock`].
///
/// Not `Send`: the release must happen on the owner that acquired it.
pub struct ReentrantLockGuard<'a> {
    lock: &'a ReentrantLock,
    _not_send: PhantomData<*const ()>,
}

impl Drop for ReentrantLockGuard<'_> {
    fn drop(&mut self) {
        if self.lock.depth.fetch_sub(1, Ordering::Relaxed) == 1 {
            self.lock.owner.store(NO_OWNER, Ordering::Release);
        }
    }
}
