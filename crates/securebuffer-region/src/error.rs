// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

//! Error types for securebuffer-region.
use thiserror::Error;

/// Errors from region allocation and page syscalls.
#[derive(Debug, Error, Clone, Copy, Eq, PartialEq)]
#[repr(u8)]
pub enum RegionError {
    /// A region must hold at least one byte.
    #[error("region capacity must be non-zero")]
    InvalidCapacity = 0,

    /// `mmap` (or the heap allocation) failed.
    #[error("mmap failed")]
    Create = 1,

    /// `mlock` failed, usually because `RLIMIT_MEMLOCK` is exhausted.
    #[error("mlock failed")]
    Lock = 2,

    /// `munlock` failed.
    #[error("munlock failed")]
    Unlock = 3,

    /// `madvise(MADV_DONTDUMP)` failed.
    #[error("madvise(MADV_DONTDUMP) failed")]
    Madvise = 4,

    /// The region type does not support the requested protection.
    #[error("operation not supported by this region")]
    Unsupported = 5,
}
