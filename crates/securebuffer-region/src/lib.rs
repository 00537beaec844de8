// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

//! Protected memory regions backing a SecureBuffer.
//!
//! A region is a fixed-capacity, zero-initialized block of memory that can be
//! locked in RAM, excluded from core dumps, and wiped in place.
//!
//! # Region Types
//!
//! ## PageRegion (Unix only)
//!
//! - Allocated with `mmap`, rounded up to whole pages
//! - `mlock` / `munlock` on demand
//! - `madvise(MADV_DONTDUMP)` on Linux
//! - Wiped, unlocked and unmapped on drop
//!
//! ## PortableRegion
//!
//! - Standard heap allocation, never reallocated
//! - No locking support
//! - Wiped on drop
//!
//! # Example
//!
//! ```rust
//! use securebuffer_region::{Fallback, Region, RegionError, allocate, is_zeroized};
//!
//! fn example() -> Result<(), RegionError> {
//!     let mut region = allocate(32, Fallback::Allow)?;
//!
//!     region.as_mut_slice()[..4].copy_from_slice(b"key!");
//!     assert_eq!(&region.as_slice()[..4], b"key!");
//!
//!     region.wipe(1);
//!     assert!(is_zeroized(region.as_slice()));
//!
//!     // Region is wiped again and released on drop
//!     Ok(())
//! }
//! # example().unwrap();
//! ```

#![warn(missing_docs)]
#![warn(unsafe_op_in_unsafe_fn)]

#[cfg(test)]
mod tests;

#[cfg(unix)]
mod page_region;

mod error;
mod portable_region;
mod traits;
mod wipe;

#[cfg(any(test, feature = "test-utils"))]
pub mod probe;

#[cfg(unix)]
pub use page_region::PageRegion;

pub use error::RegionError;
pub use portable_region::PortableRegion;
pub use traits::{Region, RegionKind};
pub use wipe::{is_zeroized, wipe};

/// Whether [`allocate`] may fall back to a [`PortableRegion`].
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Fallback {
    /// Fall back to heap memory when a page region cannot be mapped.
    Allow,
    /// Fail instead of degrading protections.
    Deny,
}

/// Allocates the best region available on this platform.
///
/// On Unix this is a [`PageRegion`]. If mapping fails and `fallback` is
/// [`Fallback::Allow`], a [`PortableRegion`] is returned instead.
///
/// # Errors
///
/// Returns [`RegionError::InvalidCapacity`] for a zero capacity, or
/// [`RegionError::Create`] when mapping fails and fallback is denied.
#[cfg(unix)]
pub fn allocate(capacity: usize, fallback: Fallback) -> Result<Box<dyn Region>, RegionError> {
    match PageRegion::new(capacity) {
        Ok(region) => Ok(Box::new(region)),
        Err(RegionError::InvalidCapacity) => Err(RegionError::InvalidCapacity),
        Err(e) if fallback == Fallback::Allow => {
            tracing::warn!(
                error = %e,
                capacity,
                "failed to map protected region, falling back to heap"
            );
            Ok(Box::new(PortableRegion::new(capacity)?))
        }
        Err(e) => Err(e),
    }
}

/// Allocates the best region available on this platform.
///
/// Non-Unix targets only provide [`PortableRegion`], so a denied fallback is
/// reported as [`RegionError::Unsupported`].
///
/// # Errors
///
/// Returns [`RegionError::InvalidCapacity`] for a zero capacity, or
/// [`RegionError::Unsupported`] when fallback is denied.
#[cfg(not(unix))]
pub fn allocate(capacity: usize, fallback: Fallback) -> Result<Box<dyn Region>, RegionError> {
    match fallback {
        Fallback::Allow => Ok(Box::new(PortableRegion::new(capacity)?)),
        Fallback::Deny => Err(RegionError::Unsupported),
    }
}
