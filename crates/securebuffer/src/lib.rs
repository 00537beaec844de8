// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

//! Locked, integrity-checked buffers for short-lived secrets.
//!
//! # Components
//!
//! - [`SecureBuffer`]: owns one protected region; tracks length, level,
//!   checksum and lock state.
//! - Access control: non-blocking reader/writer try-locks per buffer.
//! - Crypto: HMAC (SHA-256, SHA-512, BLAKE3), PBKDF2 key derivation and
//!   AES-256-GCM keyed by a buffer's contents.
//! - [`SecureChannelPool`]: bounded pool of secured channels to one endpoint
//!   with health scoring.
//! - [`Context`]: metrics, audit log and enterprise policy shared by buffers.
//!
//! # Security levels
//!
//! | Level | Locking | Verify before read | Wipe passes |
//! |---|---|---|---|
//! | `Standard` | no | no | 1 |
//! | `High` | best effort | yes | 1 |
//! | `Enterprise` | best effort | yes | 2 |
//! | `ForensicResistant` | required | yes | 4 |
//!
//! # Example
//!
//! ```
//! use securebuffer::{SecureBuffer, SecurityLevel, hmac_hex};
//!
//! let key = SecureBuffer::create(32, SecurityLevel::High).expect("create");
//! key.copy(b"sk_live_abcd").expect("copy");
//!
//! let tag = hmac_hex(&key, b"payload").expect("hmac");
//! assert_eq!(tag.len(), 64);
//!
//! key.free().expect("free");
//! ```

#![warn(missing_docs)]

#[cfg(test)]
mod tests;

mod access;
mod audit;
mod buffer;
mod channel;
mod context;
mod crypto;
mod diagnostics;
mod error;
mod level;
mod metrics;
mod policy;

pub use access::LockState;
pub use audit::{AUDIT_HISTORY_LIMIT, AuditEvent, AuditLog, AuditRecord, ComplianceReport};
pub use buffer::{MAX_BUFFER_SIZE, SecureBuffer, SecureBufferBuilder};
pub use channel::{
    Channel, ConnectionStatus, Connector, PoolConfig, PoolConfigBuilder, PoolStatus,
    SecureChannelPool, TcpConnector, read_frame, write_frame,
};
pub use context::Context;
pub use crypto::{
    Digest, DigestEncoding, HashAlgorithm, KEY_LEN, MIN_KDF_ITERATIONS, NONCE_LEN, TAG_LEN,
    decrypt_aes256_gcm, decrypt_aes256_gcm_with_aad, derive_key, encrypt_aes256_gcm,
    encrypt_aes256_gcm_with_aad, hmac, hmac_base64url, hmac_encoded, hmac_hex,
    hmac_with_algorithm,
};
pub use diagnostics::{
    BuildInfo, GuardReport, VERSION, VersionInfo, build_info, compliance_report_json,
    disable_audit_logging, enable_audit_logging, global_metrics, is_audit_logging_enabled,
    is_enterprise_build, metrics_json, prometheus_metrics, reset_metrics, run_self_check,
    self_check, set_enterprise_policy, version_info,
};
pub use error::{
    Result, SUCCESS, SecureBufferError, clear_last_error, error_string, last_error,
};
pub use level::{LevelPolicy, LockRequirement, SecurityLevel};
pub use metrics::{Metrics, MetricsSnapshot};
pub use policy::{EnterprisePolicy, PolicyStore};
