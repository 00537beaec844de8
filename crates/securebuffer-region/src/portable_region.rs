// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

//! PortableRegion - heap-backed region (no memory protection).
//!
//! Works everywhere. Used when pages cannot be mapped or on non-Unix targets.

use crate::error::RegionError;
use crate::traits::{Region, RegionKind};
use crate::wipe::wipe;

/// A region backed by a boxed slice that is never reallocated.
pub struct PortableRegion {
    inner: Box<[u8]>,
}

impl PortableRegion {
    /// Allocates a zero-initialized region of `capacity` bytes.
    pub fn new(capacity: usize) -> Result<Self, RegionError> {
        if capacity == 0 {
            return Err(RegionError::InvalidCapacity);
        }

        let mut inner = Vec::new();
        inner
            .try_reserve_exact(capacity)
            .map_err(|_| RegionError::Create)?;
        inner.resize(capacity, 0u8);

        Ok(Self {
            inner: inner.into_boxed_slice(),
        })
    }
}

impl core::fmt::Debug for PortableRegion {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PortableRegion")
            .field("capacity", &self.inner.len())
            .finish_non_exhaustive()
    }
}

impl Region for PortableRegion {
    fn capacity(&self) -> usize {
        self.inner.len()
    }

    fn as_slice(&self) -> &[u8] {
        &self.inner
    }

    fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.inner
    }

    fn as_mut_ptr(&mut self) -> *mut u8 {
        self.inner.as_mut_ptr()
    }

    fn lock(&mut self) -> Result<(), RegionError> {
        Err(RegionError::Unsupported)
    }

    fn unlock(&mut self) -> Result<(), RegionError> {
        Ok(())
    }

    fn is_locked(&self) -> bool {
        false
    }

    fn exclude_from_dumps(&mut self) -> Result<(), RegionError> {
        Err(RegionError::Unsupported)
    }

    fn kind(&self) -> RegionKind {
        RegionKind::Portable
    }
}

impl Drop for PortableRegion {
    fn drop(&mut self) {
        #[cfg(any(test, feature = "test-utils"))]
        crate::probe::on_release(&self.inner);

        wipe(&mut self.inner, 1);
    }
}
