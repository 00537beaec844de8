// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

use crate::error::RegionError;
use crate::wipe::is_zeroized;
use crate::{Fallback, allocate};

#[test]
fn test_allocate_returns_requested_capacity() {
    let region = allocate(100, Fallback::Allow).expect("Failed to allocate(..)");

    assert_eq!(region.capacity(), 100);
    assert_eq!(region.as_slice().len(), 100);
    assert!(is_zeroized(region.as_slice()));
}

#[test]
fn test_allocate_rejects_zero_capacity() {
    assert!(matches!(
        allocate(0, Fallback::Allow),
        Err(RegionError::InvalidCapacity)
    ));
    assert!(matches!(
        allocate(0, Fallback::Deny),
        Err(RegionError::InvalidCapacity)
    ));
}

#[cfg(unix)]
#[test]
fn test_allocate_prefers_page_region() {
    use crate::traits::RegionKind;

    let region = allocate(64, Fallback::Deny).expect("Failed to allocate(..)");

    assert_eq!(region.kind(), RegionKind::Page);
}

#[test]
fn test_pointer_is_stable_across_writes() {
    let mut region = allocate(32, Fallback::Allow).expect("Failed to allocate(..)");
    let before = region.as_mut_ptr();

    region.as_mut_slice()[0] = 7;
    region.wipe(1);

    assert_eq!(region.as_mut_ptr(), before);
}
