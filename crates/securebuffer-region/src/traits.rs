// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

use crate::error::RegionError;
use crate::wipe::wipe;

/// Backing storage kind, reported in diagnostics.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum RegionKind {
    /// `mmap`'d pages.
    Page,
    /// Plain heap allocation.
    Portable,
}

impl RegionKind {
    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            RegionKind::Page => "page",
            RegionKind::Portable => "portable",
        }
    }
}

/// Fixed-capacity memory that can be locked, wiped and inspected.
///
/// The address returned by [`Region::as_mut_ptr`] is stable for the lifetime
/// of the region: implementations never move or reallocate their storage.
pub trait Region: Send + Sync + core::fmt::Debug {
    /// Usable capacity in bytes.
    fn capacity(&self) -> usize;

    /// The full capacity as a slice.
    fn as_slice(&self) -> &[u8];

    /// The full capacity as a mutable slice.
    fn as_mut_slice(&mut self) -> &mut [u8];

    /// Stable pointer to the first byte.
    fn as_mut_ptr(&mut self) -> *mut u8;

    /// Locks the region in RAM. Idempotent.
    fn lock(&mut self) -> Result<(), RegionError>;

    /// Unlocks the region. Idempotent.
    fn unlock(&mut self) -> Result<(), RegionError>;

    /// Whether the region is currently locked.
    fn is_locked(&self) -> bool;

    /// Excludes the region from core dumps where the platform allows it.
    fn exclude_from_dumps(&mut self) -> Result<(), RegionError>;

    /// Backing storage kind.
    fn kind(&self) -> RegionKind;

    /// Overwrites the full capacity, finishing with zeros.
    fn wipe(&mut self, passes: u8) {
        wipe(self.as_mut_slice(), passes);
    }
}
