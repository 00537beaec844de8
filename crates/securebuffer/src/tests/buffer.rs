// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use proptest::prelude::*;
use securebuffer_region::probe::{clear_release_probe, set_release_probe};
use serial_test::serial;

use super::support::{buffer, buffer_in, buffer_with, dump};
use crate::buffer::{MAX_BUFFER_SIZE, SecureBuffer};
use crate::context::Context;
use crate::error::{SecureBufferError, last_error};
use crate::level::SecurityLevel;

// =============================================================================
// create()
// =============================================================================

#[test]
fn test_create_is_empty_and_zeroed() {
    let buffer = buffer(64);

    assert_eq!(buffer.len(), 0);
    assert!(buffer.is_empty());
    assert_eq!(buffer.capacity(), 64);
    assert!(dump(&buffer).iter().all(|&b| b == 0));
}

#[test]
fn test_create_rejects_zero_size() {
    let result = SecureBuffer::builder(0).context(Context::new()).build();

    assert_eq!(result.err(), Some(SecureBufferError::InvalidSize));
    assert_eq!(last_error(), Some(SecureBufferError::InvalidSize));
}

#[test]
fn test_create_rejects_oversized() {
    let result = SecureBuffer::builder(MAX_BUFFER_SIZE + 1)
        .context(Context::new())
        .build();

    assert_eq!(result.err(), Some(SecureBufferError::InvalidSize));
}

#[test]
fn test_create_assigns_distinct_ids() {
    let a = buffer(8);
    let b = buffer(8);

    assert_ne!(a.id(), b.id());
}

#[test]
fn test_create_high_level_verifies_and_reports_level() {
    let context = Context::new();
    let buffer = buffer_in(&context, 32, SecurityLevel::High);

    assert_eq!(buffer.security_level(), SecurityLevel::High);
    assert!(buffer.is_thread_safe());
    assert_eq!(buffer.with_data(<[u8]>::len), Ok(0));
}

#[test]
fn test_create_forensic_is_locked_or_refused() {
    let result = SecureBuffer::builder(32)
        .security_level(SecurityLevel::ForensicResistant)
        .context(Context::new())
        .build();

    match result {
        Ok(buffer) => assert!(buffer.is_locked()),
        Err(err) => assert_eq!(err, SecureBufferError::AllocationFailed),
    }
}

#[test]
fn test_create_raised_by_policy_minimum() {
    let context = Context::new();
    context
        .set_enterprise_policy(r#"{"minimum_security_level":"enterprise"}"#)
        .expect("Failed to set_enterprise_policy(..)");

    let buffer = buffer_in(&context, 16, SecurityLevel::Standard);

    assert_eq!(buffer.security_level(), SecurityLevel::Enterprise);
}

#[test]
fn test_create_limited_by_policy_max_size() {
    let context = Context::new();
    context
        .set_enterprise_policy(r#"{"max_buffer_size":128}"#)
        .expect("Failed to set_enterprise_policy(..)");

    let ok = SecureBuffer::builder(128).context(context.clone()).build();
    let too_big = SecureBuffer::builder(129).context(context).build();

    assert!(ok.is_ok());
    assert_eq!(too_big.err(), Some(SecureBufferError::InvalidSize));
}

// =============================================================================
// copy()
// =============================================================================

#[test]
fn test_copy_sets_len_and_contents() {
    let buffer = buffer_with(64, b"sk_live_abcd");

    assert_eq!(buffer.len(), 12);
    assert_eq!(
        buffer.with_data(<[u8]>::to_vec),
        Ok(b"sk_live_abcd".to_vec())
    );
}

#[test]
fn test_copy_overflow_leaves_contents() {
    let buffer = buffer_with(4, b"abcd");

    assert_eq!(buffer.copy(b"abcde"), Err(SecureBufferError::BufferOverflow));
    assert_eq!(last_error(), Some(SecureBufferError::BufferOverflow));
    assert_eq!(buffer.with_data(<[u8]>::to_vec), Ok(b"abcd".to_vec()));
}

#[test]
fn test_copy_exact_capacity() {
    let buffer = buffer(4);

    assert!(buffer.copy(b"abcd").is_ok());
    assert_eq!(buffer.len(), 4);
}

#[test]
fn test_copy_shorter_zeroes_previous_tail() {
    let buffer = buffer_with(16, b"abcdefgh");
    buffer.copy(b"xy").expect("Failed to copy(..)");

    let bytes = dump(&buffer);

    assert_eq!(&bytes[..2], b"xy");
    assert!(bytes[2..].iter().all(|&b| b == 0));
}

#[test]
fn test_copy_success_clears_last_error() {
    let buffer = buffer(4);
    let _ = buffer.copy(b"too long");
    assert!(last_error().is_some());

    buffer.copy(b"ok").expect("Failed to copy(..)");

    assert_eq!(last_error(), None);
}

// =============================================================================
// with_data_mut() / data_mut_ptr() / refresh_checksum()
// =============================================================================

#[test]
fn test_with_data_mut_reseals() {
    let context = Context::new();
    let buffer = buffer_in(&context, 8, SecurityLevel::High);
    buffer.copy(b"abc").expect("Failed to copy(..)");

    buffer
        .with_data_mut(|bytes| bytes.make_ascii_uppercase())
        .expect("Failed to with_data_mut(..)");

    assert_eq!(buffer.integrity_check(), Ok(true));
    assert_eq!(buffer.with_data(<[u8]>::to_vec), Ok(b"ABC".to_vec()));
}

#[test]
fn test_data_mut_ptr_requires_write_lock() {
    let buffer = buffer_with(8, b"abc");

    assert_eq!(
        buffer.data_mut_ptr().err(),
        Some(SecureBufferError::ThreadSafetyViolation)
    );
}

#[test]
fn test_data_mut_ptr_invalidates_until_refresh() {
    let buffer = buffer_with(8, b"abc");

    buffer.acquire_write_lock().expect("Failed to acquire_write_lock()");
    let ptr = buffer.data_mut_ptr().expect("Failed to data_mut_ptr()");
    unsafe { *ptr = b'z' };

    assert_eq!(buffer.integrity_check(), Ok(false));

    buffer.refresh_checksum().expect("Failed to refresh_checksum()");
    buffer.release_lock().expect("Failed to release_lock()");

    assert_eq!(buffer.integrity_check(), Ok(true));
    assert_eq!(buffer.with_data(<[u8]>::to_vec), Ok(b"zbc".to_vec()));
}

#[test]
fn test_tampered_high_buffer_refuses_reads() {
    let context = Context::new();
    let buffer = buffer_in(&context, 8, SecurityLevel::High);
    buffer.copy(b"secret").expect("Failed to copy(..)");

    buffer.acquire_write_lock().expect("Failed to acquire_write_lock()");
    let ptr = buffer.data_mut_ptr().expect("Failed to data_mut_ptr()");
    unsafe { *ptr ^= 0xFF };
    buffer.release_lock().expect("Failed to release_lock()");

    assert_eq!(
        buffer.with_data(|_| ()),
        Err(SecureBufferError::IntegrityCheckFailed)
    );
    assert_eq!(last_error(), Some(SecureBufferError::IntegrityCheckFailed));
    assert!(context.metrics_snapshot().integrity_check_failures >= 1);
}

#[test]
fn test_with_data_mut_after_raw_write_reseals() {
    let context = Context::new();
    let buffer = buffer_in(&context, 8, SecurityLevel::High);
    buffer.copy(b"abcd").expect("Failed to copy(..)");

    buffer.acquire_write_lock().expect("Failed to acquire_write_lock()");
    let ptr = buffer.data_mut_ptr().expect("Failed to data_mut_ptr()");
    unsafe { *ptr = b'z' };

    buffer
        .with_data_mut(|bytes| bytes[3] = b'!')
        .expect("Failed to with_data_mut(..)");
    buffer.release_lock().expect("Failed to release_lock()");

    assert_eq!(buffer.integrity_check(), Ok(true));
    assert_eq!(buffer.with_data(<[u8]>::to_vec), Ok(b"zbc!".to_vec()));
    assert_eq!(context.metrics_snapshot().integrity_check_failures, 0);
}

#[test]
fn test_standard_buffer_reads_without_verification() {
    let buffer = buffer_with(8, b"abc");

    buffer.acquire_write_lock().expect("Failed to acquire_write_lock()");
    let _ = buffer.data_mut_ptr().expect("Failed to data_mut_ptr()");
    buffer.release_lock().expect("Failed to release_lock()");

    assert_eq!(buffer.with_data(<[u8]>::len), Ok(3));
}

// =============================================================================
// lock_memory() / unlock_memory()
// =============================================================================

#[test]
#[serial(mlock)]
fn test_lock_memory_idempotent() {
    let buffer = buffer_with(32, b"abc");

    match buffer.lock_memory() {
        Ok(()) => {
            assert!(buffer.is_locked());
            assert!(buffer.lock_memory().is_ok());
            assert!(buffer.unlock_memory().is_ok());
            assert!(!buffer.is_locked());
            assert!(buffer.unlock_memory().is_ok());
        }
        Err(err) => assert_eq!(err, SecureBufferError::AllocationFailed),
    }

    assert_eq!(buffer.with_data(<[u8]>::to_vec), Ok(b"abc".to_vec()));
}

#[test]
fn test_unlock_memory_on_unlocked_is_ok() {
    let buffer = buffer(8);

    assert!(buffer.unlock_memory().is_ok());
    assert!(!buffer.is_locked());
}

// =============================================================================
// zero_memory()
// =============================================================================

#[test]
fn test_zero_memory_clears_full_capacity() {
    let buffer = buffer_with(32, b"sk_live_abcd");

    buffer.zero_memory().expect("Failed to zero_memory()");

    assert_eq!(buffer.len(), 0);
    assert!(dump(&buffer).iter().all(|&b| b == 0));
    assert_eq!(buffer.integrity_check(), Ok(true));
}

#[test]
fn test_zero_memory_forensic_passes_still_end_zero() {
    let context = Context::new();
    let Ok(buffer) = SecureBuffer::builder(16)
        .security_level(SecurityLevel::Enterprise)
        .context(context)
        .build()
    else {
        return;
    };
    buffer.copy(&[0x77; 16]).expect("Failed to copy(..)");

    buffer.zero_memory().expect("Failed to zero_memory()");

    assert!(dump(&buffer).iter().all(|&b| b == 0));
}

// =============================================================================
// integrity_check()
// =============================================================================

#[test]
fn test_integrity_check_counts() {
    let context = Context::new();
    let buffer = buffer_in(&context, 8, SecurityLevel::Standard);
    buffer.copy(b"abc").expect("Failed to copy(..)");

    assert_eq!(buffer.integrity_check(), Ok(true));
    assert_eq!(buffer.integrity_check(), Ok(true));

    let metrics = context.metrics_snapshot();
    assert_eq!(metrics.integrity_checks_performed, 2);
    assert_eq!(metrics.integrity_check_failures, 0);
}

// =============================================================================
// free()
// =============================================================================

#[test]
fn test_free_then_everything_is_null() {
    let buffer = buffer_with(64, b"sk_live_abcd");

    buffer.free().expect("Failed to free()");

    assert!(buffer.is_freed());
    assert_eq!(buffer.len(), 0);
    assert_eq!(buffer.capacity(), 64);
    assert!(!buffer.is_locked());
    assert_eq!(buffer.free(), Err(SecureBufferError::NullPointer));
    assert_eq!(buffer.copy(b"x"), Err(SecureBufferError::NullPointer));
    assert_eq!(buffer.with_data(|_| ()), Err(SecureBufferError::NullPointer));
    assert_eq!(buffer.zero_memory(), Err(SecureBufferError::NullPointer));
    assert_eq!(buffer.integrity_check(), Err(SecureBufferError::NullPointer));
    assert_eq!(buffer.lock_memory(), Err(SecureBufferError::NullPointer));
    assert_eq!(
        buffer.acquire_read_lock(),
        Err(SecureBufferError::NullPointer)
    );
    assert_eq!(buffer.data_ptr().err(), Some(SecureBufferError::NullPointer));
}

#[test]
#[serial(probe)]
fn test_free_leaves_no_secret_in_region() {
    let buffer = buffer_with(64, b"sk_live_abcd");
    assert_eq!(buffer.len(), 12);

    let target = buffer.data_ptr().expect("Failed to data_ptr()") as usize;
    let inspected = Arc::new(AtomicBool::new(false));
    let clean = Arc::new(AtomicBool::new(false));
    let (inspected_probe, clean_probe) = (inspected.clone(), clean.clone());

    set_release_probe(move |bytes| {
        if bytes.as_ptr() as usize == target {
            inspected_probe.store(true, Ordering::SeqCst);
            clean_probe.store(bytes.iter().all(|&b| b == 0), Ordering::SeqCst);
        }
    });

    buffer.free().expect("Failed to free()");
    clear_release_probe();

    assert!(inspected.load(Ordering::SeqCst));
    assert!(clean.load(Ordering::SeqCst));
}

#[test]
#[serial(probe)]
fn test_drop_leaves_no_secret_in_region() {
    let buffer = buffer_with(32, &[0x5A; 32]);

    let target = buffer.data_ptr().expect("Failed to data_ptr()") as usize;
    let clean = Arc::new(AtomicBool::new(false));
    let clean_probe = clean.clone();

    set_release_probe(move |bytes| {
        if bytes.as_ptr() as usize == target {
            clean_probe.store(bytes.iter().all(|&b| b == 0), Ordering::SeqCst);
        }
    });

    drop(buffer);
    clear_release_probe();

    assert!(clean.load(Ordering::SeqCst));
}

#[test]
fn test_create_free_pairs_balance_metrics() {
    let context = Context::new();

    for size in 1..=10 {
        let buffer = buffer_in(&context, size * 8, SecurityLevel::Standard);
        buffer.copy(b"k").expect("Failed to copy(..)");
        buffer.free().expect("Failed to free()");
    }

    let metrics = context.metrics_snapshot();
    assert_eq!(metrics.total_allocations, 10);
    assert_eq!(metrics.total_deallocations, 10);
    assert_eq!(metrics.current_active_buffers, 0);
    assert_eq!(metrics.total_bytes_allocated, metrics.total_bytes_deallocated);
}

#[test]
fn test_buffer_operations_feed_average_time() {
    let context = Context::new();
    let buffer = buffer_in(&context, 32, SecurityLevel::High);
    buffer.copy(b"abc").expect("Failed to copy(..)");
    buffer.integrity_check().expect("Failed to integrity_check()");

    let snapshot = context.metrics_snapshot();
    assert_eq!(snapshot.crypto_operations_count, 0);
    assert!(snapshot.average_operation_time_ns > 0.0);
}

#[test]
fn test_drop_without_free_counts_deallocation() {
    let context = Context::new();
    drop(buffer_in(&context, 8, SecurityLevel::Standard));

    let metrics = context.metrics_snapshot();
    assert_eq!(metrics.total_deallocations, 1);
    assert_eq!(metrics.current_active_buffers, 0);
}

#[test]
fn test_debug_is_redacted() {
    let buffer = buffer_with(16, b"hunter2");

    let debug = format!("{:?}", buffer);

    assert!(debug.contains("SecureBuffer"));
    assert!(!debug.contains("hunter2"));
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #[test]
    fn prop_create_len_zero_capacity_size(size in 1usize..4096) {
        let buffer = buffer(size);

        prop_assert_eq!(buffer.len(), 0);
        prop_assert_eq!(buffer.capacity(), size);
    }

    #[test]
    fn prop_copy_then_zero_is_all_zero(data in proptest::collection::vec(any::<u8>(), 0..256)) {
        let buffer = buffer(256);
        buffer.copy(&data).expect("Failed to copy(..)");
        prop_assert_eq!(buffer.with_data(<[u8]>::to_vec), Ok(data.clone()));

        buffer.zero_memory().expect("Failed to zero_memory()");

        prop_assert!(dump(&buffer).iter().all(|&b| b == 0));
    }
}
