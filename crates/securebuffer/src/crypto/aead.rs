// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

//! AES-256-GCM keyed by a 32-byte buffer.
//!
//! Nonces are supplied by the caller and must be unique per key; nothing here
//! generates or tracks them.

use aes_gcm::aead::{Aead, Payload};
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use zeroize::Zeroizing;

use super::{KEY_LEN, instrumented};
use crate::buffer::SecureBuffer;
use crate::error::{Result, SecureBufferError};

/// GCM nonce length.
pub const NONCE_LEN: usize = 12;

/// GCM tag length, appended to the ciphertext.
pub const TAG_LEN: usize = 16;

fn cipher(key: &[u8]) -> Result<Aes256Gcm> {
    if key.len() != KEY_LEN {
        return Err(SecureBufferError::InvalidSize);
    }

    Aes256Gcm::new_from_slice(key).map_err(|_| SecureBufferError::InvalidSize)
}

fn seal(key: &[u8], nonce: &[u8], plaintext: &[u8], aad: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    cipher(key)?
        .encrypt(Nonce::from_slice(nonce), Payload { msg: plaintext, aad })
        .map(Zeroizing::new)
        .map_err(|_| SecureBufferError::CryptoOperationFailed)
}

fn open(key: &[u8], nonce: &[u8], ciphertext: &[u8], aad: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    cipher(key)?
        .decrypt(Nonce::from_slice(nonce), Payload { msg: ciphertext, aad })
        .map(Zeroizing::new)
        .map_err(|_| SecureBufferError::IntegrityCheckFailed)
}

fn check_shapes(key: &SecureBuffer, nonce: &[u8]) -> Result<()> {
    if key.len() != KEY_LEN || nonce.len() != NONCE_LEN {
        return Err(SecureBufferError::InvalidSize);
    }

    Ok(())
}

/// Encrypts `plaintext` into `output` as `ciphertext || tag`.
pub fn encrypt_aes256_gcm(
    key: &SecureBuffer,
    nonce: &[u8],
    plaintext: &[u8],
    output: &SecureBuffer,
) -> Result<()> {
    encrypt_aes256_gcm_with_aad(key, nonce, plaintext, &[], output)
}

/// [`encrypt_aes256_gcm`] with additional authenticated data.
///
/// `output` needs `plaintext.len() + TAG_LEN` bytes of capacity; otherwise
/// `BufferOverflow` and `output` is untouched.
pub fn encrypt_aes256_gcm_with_aad(
    key: &SecureBuffer,
    nonce: &[u8],
    plaintext: &[u8],
    aad: &[u8],
    output: &SecureBuffer,
) -> Result<()> {
    instrumented(key, "encrypt_aes256_gcm", || {
        check_shapes(key, nonce)?;

        let needed = plaintext
            .len()
            .checked_add(TAG_LEN)
            .ok_or(SecureBufferError::BufferOverflow)?;
        if needed > output.capacity() {
            return Err(SecureBufferError::BufferOverflow);
        }

        let secret = key.expose("encrypt_aes256_gcm")?;
        let sealed = seal(&secret, nonce, plaintext, aad)?;

        output.store(&sealed)
    })
}

/// Decrypts `ciphertext || tag` into `output`.
pub fn decrypt_aes256_gcm(
    key: &SecureBuffer,
    nonce: &[u8],
    ciphertext: &[u8],
    output: &SecureBuffer,
) -> Result<()> {
    decrypt_aes256_gcm_with_aad(key, nonce, ciphertext, &[], output)
}

/// [`decrypt_aes256_gcm`] with additional authenticated data.
///
/// A rejected tag (or input shorter than a tag) is `IntegrityCheckFailed`;
/// no plaintext reaches `output`, which keeps its previous contents.
pub fn decrypt_aes256_gcm_with_aad(
    key: &SecureBuffer,
    nonce: &[u8],
    ciphertext: &[u8],
    aad: &[u8],
    output: &SecureBuffer,
) -> Result<()> {
    instrumented(key, "decrypt_aes256_gcm", || {
        check_shapes(key, nonce)?;

        let Some(plaintext_len) = ciphertext.len().checked_sub(TAG_LEN) else {
            key.report_integrity_failure("decrypt_aes256_gcm");
            return Err(SecureBufferError::IntegrityCheckFailed);
        };
        if plaintext_len > output.capacity() {
            return Err(SecureBufferError::BufferOverflow);
        }

        let secret = key.expose("decrypt_aes256_gcm")?;
        let plaintext = open(&secret, nonce, ciphertext, aad).inspect_err(|err| {
            if *err == SecureBufferError::IntegrityCheckFailed {
                key.report_integrity_failure("decrypt_aes256_gcm");
            }
        })?;

        output.store(&plaintext)
    })
}
