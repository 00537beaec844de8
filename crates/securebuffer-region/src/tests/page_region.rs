// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serial_test::serial;

use crate::error::RegionError;
use crate::page_region::PageRegion;
use crate::probe::{clear_release_probe, set_release_probe};
use crate::traits::{Region, RegionKind};
use crate::wipe::is_zeroized;

// =============================================================================
// new()
// =============================================================================

#[test]
fn test_new_is_zeroized() {
    let region = PageRegion::new(100).expect("Failed to new()");

    assert_eq!(region.capacity(), 100);
    assert_eq!(region.as_slice().len(), 100);
    assert!(is_zeroized(region.as_slice()));
    assert_eq!(region.kind(), RegionKind::Page);
}

#[test]
fn test_new_rounds_mapping_to_pages() {
    let region = PageRegion::new(1).expect("Failed to new()");

    assert!(region.mapped_len() >= region.capacity());
    assert_eq!(region.mapped_len() % 4096, 0);
}

#[test]
fn test_new_rejects_zero_capacity() {
    assert!(matches!(
        PageRegion::new(0),
        Err(RegionError::InvalidCapacity)
    ));
}

#[test]
fn test_new_rejects_overflowing_capacity() {
    assert!(matches!(
        PageRegion::new(usize::MAX),
        Err(RegionError::Create)
    ));
}

// =============================================================================
// lock() / unlock()
// =============================================================================

#[test]
fn test_lock_unlock_idempotent() {
    let mut region = PageRegion::new(64).expect("Failed to new()");

    match region.lock() {
        Ok(()) => {
            assert!(region.is_locked());
            assert!(region.lock().is_ok());
            assert!(region.unlock().is_ok());
            assert!(!region.is_locked());
            assert!(region.unlock().is_ok());
        }
        // RLIMIT_MEMLOCK may be zero in constrained environments.
        Err(err) => {
            assert_eq!(err, RegionError::Lock);
            assert!(!region.is_locked());
        }
    }
}

#[cfg(target_os = "linux")]
#[test]
fn test_exclude_from_dumps_linux() {
    let mut region = PageRegion::new(64).expect("Failed to new()");

    assert!(region.exclude_from_dumps().is_ok());
}

// =============================================================================
// wipe()
// =============================================================================

#[test]
fn test_wipe_clears_capacity() {
    let mut region = PageRegion::new(32).expect("Failed to new()");
    region.as_mut_slice().fill(0xEE);

    region.wipe(3);

    assert!(is_zeroized(region.as_slice()));
}

// =============================================================================
// Drop
// =============================================================================

#[test]
#[serial(probe)]
fn test_drop_probe_sees_owner_contents() {
    let mut region = PageRegion::new(16).expect("Failed to new()");
    region.as_mut_slice().copy_from_slice(&[0x42u8; 16]);
    let target = region.as_mut_ptr() as usize;

    let saw_secret = Arc::new(AtomicBool::new(false));
    let saw_secret_probe = saw_secret.clone();

    set_release_probe(move |bytes| {
        if bytes.as_ptr() as usize == target {
            saw_secret_probe.store(bytes[..16] == [0x42u8; 16], Ordering::SeqCst);
        }
    });

    drop(region);
    clear_release_probe();

    assert!(saw_secret.load(Ordering::SeqCst));
}

#[test]
#[serial(probe)]
fn test_drop_probe_sees_wiped_region() {
    let mut region = PageRegion::new(16).expect("Failed to new()");
    region.as_mut_slice().copy_from_slice(&[0x42u8; 16]);
    region.wipe(2);
    let target = region.as_mut_ptr() as usize;

    let clean = Arc::new(AtomicBool::new(false));
    let clean_probe = clean.clone();

    set_release_probe(move |bytes| {
        if bytes.as_ptr() as usize == target {
            clean_probe.store(is_zeroized(bytes), Ordering::SeqCst);
        }
    });

    drop(region);
    clear_release_probe();

    assert!(clean.load(Ordering::SeqCst));
}
