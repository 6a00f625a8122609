//! Synchronization primitives.
//!
//! Both locks are const-constructable and usable before any allocator or
//! scheduler is available.

mod reentrant;
mod spinlock;

pub use reentrant::{ReentrantLock, ReentrantLockGuard};
pub use spinlock::{SpinLock, SpinLockGuard};
