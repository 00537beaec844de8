// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

//! Self-check, version/build metadata and global-context shorthands.

use std::path::Path;

use serde::Serialize;

use crate::buffer::{MAX_BUFFER_SIZE, SecureBuffer};
use crate::context::Context;
use crate::crypto::{
    self, HashAlgorithm, MIN_KDF_ITERATIONS, NONCE_LEN, TAG_LEN, decrypt_aes256_gcm,
    encrypt_aes256_gcm, hmac,
};
use crate::error::{Result, SecureBufferError, last_error, restore_last_error};
use crate::level::SecurityLevel;
use crate::metrics::MetricsSnapshot;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// Version / build
// =============================================================================

/// Static version metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionInfo {
    /// Library name.
    pub name: &'static str,
    /// `major.minor.patch`.
    pub version: &'static str,
    /// Major component.
    pub major: &'static str,
    /// Minor component.
    pub minor: &'static str,
    /// Patch component.
    pub patch: &'static str,
}

impl VersionInfo {
    /// JSON object.
    pub fn to_json(&self) -> String {
        to_json(self)
    }
}

/// Static version metadata.
pub fn version_info() -> VersionInfo {
    VersionInfo {
        name: env!("CARGO_PKG_NAME"),
        version: VERSION,
        major: env!("CARGO_PKG_VERSION_MAJOR"),
        minor: env!("CARGO_PKG_VERSION_MINOR"),
        patch: env!("CARGO_PKG_VERSION_PATCH"),
    }
}

/// Process guard outcome as reported in [`BuildInfo`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuardReport {
    /// `PR_SET_DUMPABLE` cleared.
    pub not_dumpable: bool,
    /// `RLIMIT_CORE` set to 0.
    pub core_limit_zero: bool,
    /// `full`, `partial` or `none`.
    pub label: &'static str,
}

/// Build and platform metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildInfo {
    /// Crate version.
    pub version: &'static str,
    /// Target OS.
    pub target_os: &'static str,
    /// Target architecture.
    pub target_arch: &'static str,
    /// Built with debug assertions.
    pub debug: bool,
    /// Enterprise feature set present.
    pub enterprise: bool,
    /// `mmap`/`mlock` regions available.
    pub page_regions: bool,
    /// Process guard compiled in.
    pub guard_compiled: bool,
    /// Process guard outcome, once a `ForensicResistant` buffer engaged it.
    pub guard: Option<GuardReport>,
    /// Largest accepted capacity.
    pub max_buffer_size: usize,
    /// KDF iteration floor.
    pub min_kdf_iterations: u32,
    /// Supported primitives.
    pub algorithms: [&'static str; 5],
}

impl BuildInfo {
    /// JSON object.
    pub fn to_json(&self) -> String {
        to_json(self)
    }
}

/// Build and platform metadata.
pub fn build_info() -> BuildInfo {
    BuildInfo {
        version: VERSION,
        target_os: std::env::consts::OS,
        target_arch: std::env::consts::ARCH,
        debug: cfg!(debug_assertions),
        enterprise: is_enterprise_build(),
        page_regions: cfg!(unix),
        guard_compiled: securebuffer_guard::is_compiled_in(),
        guard: securebuffer_guard::status().map(|status| GuardReport {
            not_dumpable: status.not_dumpable,
            core_limit_zero: status.core_limit_zero,
            label: status.label(),
        }),
        max_buffer_size: MAX_BUFFER_SIZE,
        min_kdf_iterations: MIN_KDF_ITERATIONS,
        algorithms: [
            "hmac-sha256",
            "hmac-sha512",
            "blake3-keyed",
            "aes-256-gcm",
            "pbkdf2-hmac-sha256",
        ],
    }
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| String::from("{}"))
}

/// Always `true`: audit, policy and pool features are part of every build.
pub fn is_enterprise_build() -> bool {
    true
}

// =============================================================================
// Self-check
// =============================================================================

/// Runs [`run_self_check`] and reports pass/fail.
///
/// Uses a private context: live buffers, global metrics and the caller's last
/// error are left as they were.
pub fn self_check() -> bool {
    let saved = last_error();
    let outcome = run_self_check();
    restore_last_error(saved);

    if let Err(err) = outcome {
        tracing::error!(error = %err, "self-check failed");
    }

    outcome.is_ok()
}

fn ensure(condition: bool, err: SecureBufferError) -> Result<()> {
    if condition { Ok(()) } else { Err(err) }
}

/// Exercises allocation, integrity, locking, HMAC and AES-GCM end to end.
pub fn run_self_check() -> Result<()> {
    let context = Context::new();
    let buffer = SecureBuffer::builder(64)
        .security_level(SecurityLevel::High)
        .context(context.clone())
        .build()?;

    // Contents and integrity.
    buffer.copy(b"key")?;
    ensure(buffer.len() == 3, SecureBufferError::InvalidSize)?;
    ensure(buffer.integrity_check()?, SecureBufferError::IntegrityCheckFailed)?;

    // Known-answer HMAC-SHA256.
    let digest = hmac(
        &buffer,
        b"The quick brown fox jumps over the lazy dog",
        HashAlgorithm::Sha256,
    )?;
    ensure(
        digest.to_hex() == "f7bc83f430538424b13298e6aa6fb143ef4d59a14946175997479dbc2d1a3cd8",
        SecureBufferError::CryptoOperationFailed,
    )?;

    // Lock discipline.
    buffer.acquire_write_lock()?;
    ensure(
        buffer.acquire_read_lock() == Err(SecureBufferError::ThreadSafetyViolation),
        SecureBufferError::ThreadSafetyViolation,
    )?;
    buffer.release_lock()?;

    // AEAD round trip and tamper rejection.
    let mut material = zeroize::Zeroizing::new([0u8; crypto::KEY_LEN]);
    getrandom::fill(&mut material[..]).map_err(|_| SecureBufferError::CryptoOperationFailed)?;
    buffer.copy(&material[..])?;

    let nonce = [7u8; NONCE_LEN];
    let plaintext = b"self-check plaintext";
    let sealed = SecureBuffer::builder(plaintext.len() + TAG_LEN)
        .context(context.clone())
        .build()?;
    let opened = SecureBuffer::builder(plaintext.len())
        .context(context.clone())
        .build()?;

    encrypt_aes256_gcm(&buffer, &nonce, plaintext, &sealed)?;
    let mut ciphertext = sealed.with_data(<[u8]>::to_vec)?;
    decrypt_aes256_gcm(&buffer, &nonce, &ciphertext, &opened)?;
    ensure(
        opened.with_data(|bytes| bytes == plaintext)?,
        SecureBufferError::CryptoOperationFailed,
    )?;

    ciphertext[0] ^= 0x01;
    ensure(
        decrypt_aes256_gcm(&buffer, &nonce, &ciphertext, &opened)
            == Err(SecureBufferError::IntegrityCheckFailed),
        SecureBufferError::IntegrityCheckFailed,
    )?;

    // Zeroization and release.
    buffer.zero_memory()?;
    ensure(
        buffer.with_data(<[u8]>::is_empty)?,
        SecureBufferError::CryptoOperationFailed,
    )?;
    buffer.free()?;
    ensure(
        buffer.copy(b"x") == Err(SecureBufferError::NullPointer),
        SecureBufferError::NullPointer,
    )?;

    drop((sealed, opened));

    let metrics = context.metrics_snapshot();
    ensure(
        metrics.total_allocations == 3
            && metrics.total_deallocations == 3
            && metrics.current_active_buffers == 0,
        SecureBufferError::AllocationFailed,
    )
}

// =============================================================================
// Global context shorthands
// =============================================================================

/// Snapshot of the global metrics.
pub fn global_metrics() -> MetricsSnapshot {
    Context::global().metrics_snapshot()
}

/// Zeroes the global counters.
pub fn reset_metrics() {
    Context::global().reset_metrics();
}

/// Global metrics as JSON.
pub fn metrics_json() -> String {
    global_metrics().to_json()
}

/// Global metrics in Prometheus text format.
pub fn prometheus_metrics() -> String {
    global_metrics().to_prometheus()
}

/// Enables global audit logging to `path`.
pub fn enable_audit_logging(path: impl AsRef<Path>) -> Result<()> {
    Context::global().enable_audit_logging(path)
}

/// Disables global audit logging.
pub fn disable_audit_logging() -> Result<()> {
    Context::global().disable_audit_logging()
}

/// Whether global audit logging is on.
pub fn is_audit_logging_enabled() -> bool {
    Context::global().is_audit_logging_enabled()
}

/// Global compliance report as JSON.
pub fn compliance_report_json() -> String {
    Context::global().compliance_report().to_json()
}

/// Applies an enterprise policy to the global context.
pub fn set_enterprise_policy(json: &str) -> Result<()> {
    Context::global().set_enterprise_policy(json)
}
