//! Core support for the Hadron ACPI crates.
//!
//! Provides the leveled kernel log ([`kinfo!`], [`kwarn!`], ...) and the
//! lock primitives used by the namespace and interpreter: a TTAS
//! [`sync::SpinLock`] and an owner-tagged [`sync::ReentrantLock`].
//!
//! Everything here is `no_std` and host-testable with `cargo test`.

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]

pub mod log;
pub mod sync;
