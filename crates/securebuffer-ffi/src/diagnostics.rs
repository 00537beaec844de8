// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

//! Metrics, audit, policy and build metadata.

use std::ffi::c_char;

use securebuffer::{MetricsSnapshot, SecureBufferError};

use crate::error::{ffi_call, securebuffer_get_last_error, set_last_error, status};
use crate::strings::{into_raw, text};

/// C layout of a metrics snapshot.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SecureBufferMetrics {
    /// Buffers created.
    pub total_allocations: u64,
    /// Buffers freed.
    pub total_deallocations: u64,
    /// Buffers currently alive.
    pub current_active_buffers: u64,
    /// High-water mark of live buffers.
    pub peak_active_buffers: u64,
    /// Capacity bytes reserved.
    pub total_bytes_allocated: u64,
    /// Capacity bytes released.
    pub total_bytes_deallocated: u64,
    /// Checksum verifications.
    pub integrity_checks_performed: u64,
    /// Verifications that failed.
    pub integrity_check_failures: u64,
    /// Mean wall time of timed operations.
    pub average_operation_time_ns: f64,
    /// HMAC, KDF and AEAD calls.
    pub crypto_operations_count: u64,
}

impl From<MetricsSnapshot> for SecureBufferMetrics {
    fn from(snapshot: MetricsSnapshot) -> Self {
        Self {
            total_allocations: snapshot.total_allocations,
            total_deallocations: snapshot.total_deallocations,
            current_active_buffers: snapshot.current_active_buffers,
            peak_active_buffers: snapshot.peak_active_buffers,
            total_bytes_allocated: snapshot.total_bytes_allocated,
            total_bytes_deallocated: snapshot.total_bytes_deallocated,
            integrity_checks_performed: snapshot.integrity_checks_performed,
            integrity_check_failures: snapshot.integrity_check_failures,
            average_operation_time_ns: snapshot.average_operation_time_ns,
            crypto_operations_count: snapshot.crypto_operations_count,
        }
    }
}

fn owned_string(name: &'static str, f: impl FnOnce() -> String) -> *mut c_char {
    ffi_call(
        name,
        || Ok::<_, SecureBufferError>(f()),
        |result| result.map_or(core::ptr::null_mut(), into_raw),
    )
}

// =============================================================================
// Metrics
// =============================================================================

/// Snapshot of the global counters.
#[unsafe(no_mangle)]
pub extern "C" fn securebuffer_get_global_metrics() -> SecureBufferMetrics {
    ffi_call(
        "securebuffer_get_global_metrics",
        || Ok(securebuffer::global_metrics()),
        |result| result.map(SecureBufferMetrics::from).unwrap_or_default(),
    )
}

/// Global counters as JSON. Free with `securebuffer_free_cstr`.
#[unsafe(no_mangle)]
pub extern "C" fn securebuffer_get_metrics_json() -> *mut c_char {
    owned_string("securebuffer_get_metrics_json", securebuffer::metrics_json)
}

/// Global counters in Prometheus text format. Free with `securebuffer_free_cstr`.
#[unsafe(no_mangle)]
pub extern "C" fn securebuffer_get_prometheus_metrics() -> *mut c_char {
    owned_string(
        "securebuffer_get_prometheus_metrics",
        securebuffer::prometheus_metrics,
    )
}

/// Zeroes the global counters; live buffers are unaffected.
#[unsafe(no_mangle)]
pub extern "C" fn securebuffer_reset_metrics() {
    status("securebuffer_reset_metrics", || {
        securebuffer::reset_metrics();
        Ok(())
    });
}

// =============================================================================
// Metadata
// =============================================================================

/// Runs the internal self-check on private buffers.
///
/// Leaves the last error untouched.
#[unsafe(no_mangle)]
pub extern "C" fn securebuffer_self_check() -> bool {
    let saved = securebuffer_get_last_error();
    let passed = ffi_call(
        "securebuffer_self_check",
        || Ok(securebuffer::self_check()),
        |result| result.unwrap_or(false),
    );
    set_last_error(saved);

    passed
}

/// Version metadata as JSON. Free with `securebuffer_free_cstr`.
#[unsafe(no_mangle)]
pub extern "C" fn securebuffer_get_version_info() -> *mut c_char {
    owned_string("securebuffer_get_version_info", || {
        securebuffer::version_info().to_json()
    })
}

/// Always `true`.
#[unsafe(no_mangle)]
pub extern "C" fn securebuffer_is_enterprise_build() -> bool {
    securebuffer::is_enterprise_build()
}

/// Build and platform metadata as JSON. Free with `securebuffer_free_cstr`.
#[unsafe(no_mangle)]
pub extern "C" fn securebuffer_get_build_info() -> *mut c_char {
    owned_string("securebuffer_get_build_info", || {
        securebuffer::build_info().to_json()
    })
}

// =============================================================================
// Audit and policy
// =============================================================================

/// Appends audit records to `log_path`.
///
/// # Safety
///
/// `log_path` must be null or a valid NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn securebuffer_enable_audit_logging(log_path: *const c_char) -> i32 {
    status("securebuffer_enable_audit_logging", || {
        // SAFETY: forwarded caller contract.
        let path = unsafe { text(log_path) }?;
        securebuffer::enable_audit_logging(path)
    })
}

/// Stops audit logging; refused while the policy requires it.
#[unsafe(no_mangle)]
pub extern "C" fn securebuffer_disable_audit_logging() -> i32 {
    status(
        "securebuffer_disable_audit_logging",
        securebuffer::disable_audit_logging,
    )
}

/// Whether audit logging is on.
#[unsafe(no_mangle)]
pub extern "C" fn securebuffer_is_audit_logging_enabled() -> bool {
    securebuffer::is_audit_logging_enabled()
}

/// Compliance report as JSON. Free with `securebuffer_free_cstr`.
#[unsafe(no_mangle)]
pub extern "C" fn securebuffer_get_compliance_report() -> *mut c_char {
    owned_string(
        "securebuffer_get_compliance_report",
        securebuffer::compliance_report_json,
    )
}

/// Validates and applies an enterprise policy document.
///
/// # Safety
///
/// `policy_json` must be null or a valid NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn securebuffer_set_enterprise_policy(policy_json: *const c_char) -> i32 {
    status("securebuffer_set_enterprise_policy", || {
        // SAFETY: forwarded caller contract.
        let json = unsafe { text(policy_json) }?;
        securebuffer::set_enterprise_policy(json)
    })
}
