#![no_std]
//! # ArcWeak: small, memory-friendly atomic reference counting with weak references
//!
//! ArcWeak is a lightweight, thread-safe reference-counting pointer for Rust
//! that keeps weak references while staying compact. Every managed object
//! lives in a single heap control block holding the value, a strong counter
//! and a weak counter. Strong handles keep the value alive; weak handles keep
//! only the control block alive and can be upgraded back into strong handles
//! for as long as the value has not been dropped.
//!
//! Two payload forms are provided:
//!
//! - [`Arc<T>`] / [`Weak<T>`] manage a single value;
//! - [`ArcSlice<T>`] / [`WeakSlice<T>`] manage a separately allocated buffer
//!   of `T` elements, built with a given length.
//!
//! ## Why use ArcWeak?
//!
//! - Handles are a single machine word and may be null, so an empty handle
//!   needs no `Option` wrapper and no extra space
//! - The counters use half a machine word on 64-bit systems, which usually
//!   fits the padding of the control block
//! - [`Weak::lock`] never resurrects a dropped value: upgrades only succeed
//!   while the strong count is provably above zero
//! - It supports `no_std` with extern alloc
//!
//! ## Why not use ArcWeak?
//!
//! - It does not support data as DSTs other than the slice form
//! - Equality, ordering and hashing compare handle identity, not values
//! - With ArcWeak in 64-bit systems, you only can have `4,294,967,296 - 512`
//!   live strong references, and as many weak references, to an object. In
//!   32-bit systems the limit is `usize::MAX - 64`, the same order as the
//!   standard library.
//!
//! ## Comparison
//!
//! |                            | arcweak::Arc | std::sync::Arc |
//! | -------------------------- | :----------: | :------------: |
//! | Overhead in 64-bit systems |   8 bytes    |    16 bytes    |
//! | Overhead in 32-bit systems | 8 or 4 bytes |    8 bytes     |
//! | Weak References            |      ✅      |       ✅       |
//! | Null handles               |      ✅      |       ❌       |
//! | DST Support                |  slice only  |       ✅       |
//!
//! ## Lifetime protocol
//!
//! Both counters start at one: the first strong handle also owns one weak
//! reference on behalf of all strong handles. When the strong count drops to
//! zero the value is dropped and that implicit weak reference is released;
//! when the weak count drops to zero the control block is freed. The block is
//! therefore always freed after the value, and exactly once.
//!
//! ### Features
//!
//! By default, ArcWeak uses 32-bit counters on 64-bit systems and `usize`
//! counters elsewhere, with the `usize-for-small-platforms` feature enabled.
//! Disabling the default features switches 32-bit platforms to 16-bit
//! counters. 16-bit and 8-bit platforms are not supported.
//!
//! Building with `RUSTFLAGS="--cfg loom"` swaps the atomics for the ones of
//! the [loom](https://docs.rs/loom) model checker.

#![warn(missing_docs, missing_debug_implementations)]
extern crate alloc;
#[cfg(test)]
extern crate std;

#[allow(unused_imports)]
pub(crate) mod atomic {
    #[cfg(loom)]
    pub(crate) use loom::{
        hint::spin_loop,
        sync::atomic::{fence, AtomicU16, AtomicU32, AtomicUsize, Ordering},
    };

    #[cfg(not(loom))]
    pub(crate) use core::{
        hint::spin_loop,
        sync::atomic::{fence, AtomicU16, AtomicU32, AtomicUsize, Ordering},
    };
}

// Counter definition

#[cfg(target_pointer_width = "64")]
pub(crate) use crate::atomic::AtomicU32 as AtomicCounter;

#[cfg(all(target_pointer_width = "32", feature = "usize-for-small-platforms"))]
pub(crate) use crate::atomic::AtomicUsize as AtomicCounter;

#[cfg(all(
    target_pointer_width = "32",
    not(feature = "usize-for-small-platforms")
))]
pub(crate) use crate::atomic::AtomicU16 as AtomicCounter;

#[cfg(target_pointer_width = "64")]
#[allow(non_camel_case_types)]
pub(crate) type ucount = u32;

#[cfg(all(target_pointer_width = "32", feature = "usize-for-small-platforms"))]
#[allow(non_camel_case_types)]
pub(crate) type ucount = usize;

#[cfg(all(
    target_pointer_width = "32",
    not(feature = "usize-for-small-platforms")
))]
#[allow(non_camel_case_types)]
pub(crate) type ucount = u16;

#[cfg(any(target_pointer_width = "64", target_pointer_width = "32"))]
mod arc;
#[cfg(any(target_pointer_width = "64", target_pointer_width = "32"))]
mod block;
mod error;
#[cfg(any(target_pointer_width = "64", target_pointer_width = "32"))]
mod slice;
#[cfg(any(target_pointer_width = "64", target_pointer_width = "32"))]
mod weak;

#[cfg(any(target_pointer_width = "64", target_pointer_width = "32"))]
pub use arc::*;
pub use error::AllocError;
#[cfg(any(target_pointer_width = "64", target_pointer_width = "32"))]
pub use slice::*;
#[cfg(any(target_pointer_width = "64", target_pointer_width = "32"))]
pub use weak::*;
