// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

//! Crypto operations keyed by a buffer's contents.
//!
//! Key material is read under the buffer's lock discipline and never leaves
//! it except inside zeroizing temporaries. Every call counts as one crypto
//! operation and is audited.

mod aead;
mod kdf;
mod mac;

pub use aead::{
    NONCE_LEN, TAG_LEN, decrypt_aes256_gcm, decrypt_aes256_gcm_with_aad, encrypt_aes256_gcm,
    encrypt_aes256_gcm_with_aad,
};
pub use kdf::{MIN_KDF_ITERATIONS, derive_key};
pub use mac::{
    Digest, DigestEncoding, HashAlgorithm, hmac, hmac_base64url, hmac_encoded, hmac_hex,
    hmac_with_algorithm,
};

use crate::audit::AuditEvent;
use crate::buffer::SecureBuffer;
use crate::error::{Result, record};

/// AES-256 key length.
pub const KEY_LEN: usize = 32;

/// Times, counts and audits `op` against `key`, then records its outcome.
fn instrumented<T>(
    key: &SecureBuffer,
    operation: &'static str,
    op: impl FnOnce() -> Result<T>,
) -> Result<T> {
    let context = key.context();
    let outcome = context.metrics().timed(op);

    context.metrics().on_crypto_operation();
    context.audit().record(
        AuditEvent::CryptoOperation,
        Some(key.id()),
        operation,
        outcome.is_ok(),
    );

    if let Err(err) = &outcome {
        tracing::debug!(buffer_id = key.id(), operation, error = %err, "crypto operation failed");
    }

    record(outcome)
}
