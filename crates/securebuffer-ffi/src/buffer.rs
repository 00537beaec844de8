// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

//! `securebuffer_*` buffer, protection, crypto and locking functions.

use std::ffi::c_char;

use securebuffer::{
    HashAlgorithm, SecureBuffer, SecureBufferError, SecurityLevel, decrypt_aes256_gcm,
    derive_key, encrypt_aes256_gcm, hmac_base64url, hmac_hex, hmac_with_algorithm,
};

use crate::error::{ffi_call, status};
use crate::handles::{BUFFERS, SecureBufferHandle};
use crate::strings::{bytes, into_raw};

fn with_buffer<T>(
    handle: SecureBufferHandle,
    f: impl FnOnce(&SecureBuffer) -> Result<T, SecureBufferError>,
) -> Result<T, SecureBufferError> {
    let buffer = BUFFERS.get(handle)?;
    f(&buffer)
}

fn insert(
    buffer: Result<SecureBuffer, SecureBufferError>,
) -> Result<SecureBufferHandle, SecureBufferError> {
    buffer.map(|buffer| BUFFERS.insert(buffer))
}

// =============================================================================
// Lifecycle
// =============================================================================

/// Creates a `Standard` buffer of `size` bytes. Returns `0` on failure.
#[unsafe(no_mangle)]
pub extern "C" fn securebuffer_new(size: usize) -> SecureBufferHandle {
    ffi_call(
        "securebuffer_new",
        || insert(SecureBuffer::new(size)),
        |result| result.unwrap_or(0),
    )
}

/// Creates a buffer at `level` (0..=3). Returns `0` on failure.
#[unsafe(no_mangle)]
pub extern "C" fn securebuffer_new_with_security_level(
    size: usize,
    level: i32,
) -> SecureBufferHandle {
    ffi_call(
        "securebuffer_new_with_security_level",
        || {
            let level = SecurityLevel::try_from(level)?;
            insert(SecureBuffer::create(size, level))
        },
        |result| result.unwrap_or(0),
    )
}

/// Wipes and releases the buffer. The handle is invalid afterwards.
///
/// Fails with `THREAD_SAFETY_VIOLATION` (handle still valid) while another
/// thread holds a lock on it.
#[unsafe(no_mangle)]
pub extern "C" fn securebuffer_free(handle: SecureBufferHandle) -> i32 {
    status("securebuffer_free", || {
        let buffer = BUFFERS.get(handle)?;
        buffer.free()?;
        BUFFERS.remove(handle);

        Ok(())
    })
}

// =============================================================================
// Contents
// =============================================================================

/// Replaces the contents with `len` bytes at `data`.
///
/// # Safety
///
/// If `len > 0`, `data` must be valid for reads of `len` bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn securebuffer_copy(
    handle: SecureBufferHandle,
    data: *const u8,
    len: usize,
) -> i32 {
    status("securebuffer_copy", || {
        // SAFETY: forwarded caller contract.
        let data = unsafe { bytes(data, len) }?;
        with_buffer(handle, |buffer| buffer.copy(data))
    })
}

/// Mutable pointer to the contents, valid for `capacity` bytes until free.
///
/// Thread-safe buffers require the caller to hold the write lock. The
/// checksum is invalid until `securebuffer_refresh_checksum` or the next
/// mutating call. Null on failure.
#[unsafe(no_mangle)]
pub extern "C" fn securebuffer_data(handle: SecureBufferHandle) -> *mut u8 {
    ffi_call(
        "securebuffer_data",
        || with_buffer(handle, SecureBuffer::data_mut_ptr),
        |result| result.unwrap_or(core::ptr::null_mut()),
    )
}

/// Read-only pointer to the contents, valid for `capacity` bytes until free.
/// Null on failure.
#[unsafe(no_mangle)]
pub extern "C" fn securebuffer_data_readonly(handle: SecureBufferHandle) -> *const u8 {
    ffi_call(
        "securebuffer_data_readonly",
        || with_buffer(handle, SecureBuffer::data_ptr),
        |result| result.unwrap_or(core::ptr::null()),
    )
}

/// Re-seals the checksum after writes through `securebuffer_data`.
#[unsafe(no_mangle)]
pub extern "C" fn securebuffer_refresh_checksum(handle: SecureBufferHandle) -> i32 {
    status("securebuffer_refresh_checksum", || {
        with_buffer(handle, SecureBuffer::refresh_checksum)
    })
}

/// Occupied bytes; `0` for an invalid handle.
#[unsafe(no_mangle)]
pub extern "C" fn securebuffer_len(handle: SecureBufferHandle) -> usize {
    ffi_call(
        "securebuffer_len",
        || with_buffer(handle, |buffer| Ok(buffer.len())),
        |result| result.unwrap_or(0),
    )
}

/// Capacity in bytes; `0` for an invalid handle.
#[unsafe(no_mangle)]
pub extern "C" fn securebuffer_capacity(handle: SecureBufferHandle) -> usize {
    ffi_call(
        "securebuffer_capacity",
        || with_buffer(handle, |buffer| Ok(buffer.capacity())),
        |result| result.unwrap_or(0),
    )
}

// =============================================================================
// Memory protection
// =============================================================================

/// Locks the buffer in RAM.
#[unsafe(no_mangle)]
pub extern "C" fn securebuffer_lock_memory(handle: SecureBufferHandle) -> i32 {
    status("securebuffer_lock_memory", || {
        with_buffer(handle, SecureBuffer::lock_memory)
    })
}

/// Unlocks the buffer.
#[unsafe(no_mangle)]
pub extern "C" fn securebuffer_unlock_memory(handle: SecureBufferHandle) -> i32 {
    status("securebuffer_unlock_memory", || {
        with_buffer(handle, SecureBuffer::unlock_memory)
    })
}

/// Whether the buffer is locked in RAM; `false` for an invalid handle.
#[unsafe(no_mangle)]
pub extern "C" fn securebuffer_is_locked(handle: SecureBufferHandle) -> bool {
    ffi_call(
        "securebuffer_is_locked",
        || with_buffer(handle, |buffer| Ok(buffer.is_locked())),
        |result| result.unwrap_or(false),
    )
}

/// Zeroes the full capacity; length becomes 0.
#[unsafe(no_mangle)]
pub extern "C" fn securebuffer_zero_memory(handle: SecureBufferHandle) -> i32 {
    status("securebuffer_zero_memory", || {
        with_buffer(handle, SecureBuffer::zero_memory)
    })
}

/// `true` if the contents match their checksum.
///
/// A mismatch sets the last error to `INTEGRITY_CHECK_FAILED`.
#[unsafe(no_mangle)]
pub extern "C" fn securebuffer_integrity_check(handle: SecureBufferHandle) -> bool {
    ffi_call(
        "securebuffer_integrity_check",
        || {
            with_buffer(handle, |buffer| match buffer.integrity_check()? {
                true => Ok(()),
                false => Err(SecureBufferError::IntegrityCheckFailed),
            })
        },
        |result| result.is_ok(),
    )
}

// =============================================================================
// Crypto
// =============================================================================

/// # Safety
///
/// If `len > 0`, `data` must be valid for reads of `len` bytes.
unsafe fn mac_string(
    name: &'static str,
    handle: SecureBufferHandle,
    data: *const u8,
    len: usize,
    mac: impl FnOnce(&SecureBuffer, &[u8]) -> Result<String, SecureBufferError>,
) -> *mut c_char {
    ffi_call(
        name,
        || {
            // SAFETY: forwarded caller contract.
            let data = unsafe { bytes(data, len) }?;
            with_buffer(handle, |key| mac(key, data))
        },
        |result| result.map_or(core::ptr::null_mut(), into_raw),
    )
}

/// HMAC-SHA-256 of `data` keyed by the buffer, as lowercase hex.
///
/// Free the result with `securebuffer_free_cstr`. Null on failure.
///
/// # Safety
///
/// If `data_len > 0`, `data` must be valid for reads of `data_len` bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn securebuffer_hmac_hex(
    handle: SecureBufferHandle,
    data: *const u8,
    data_len: usize,
) -> *mut c_char {
    // SAFETY: forwarded caller contract.
    unsafe { mac_string("securebuffer_hmac_hex", handle, data, data_len, hmac_hex) }
}

/// HMAC-SHA-256 as unpadded base64url. See [`securebuffer_hmac_hex`].
///
/// # Safety
///
/// If `data_len > 0`, `data` must be valid for reads of `data_len` bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn securebuffer_hmac_base64url(
    handle: SecureBufferHandle,
    data: *const u8,
    data_len: usize,
) -> *mut c_char {
    // SAFETY: forwarded caller contract.
    unsafe {
        mac_string(
            "securebuffer_hmac_base64url",
            handle,
            data,
            data_len,
            hmac_base64url,
        )
    }
}

/// Hex MAC with `algorithm` (0 SHA-256, 1 SHA-512, 2 BLAKE3).
///
/// # Safety
///
/// If `data_len > 0`, `data` must be valid for reads of `data_len` bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn securebuffer_hmac_with_algorithm(
    handle: SecureBufferHandle,
    data: *const u8,
    data_len: usize,
    algorithm: u32,
) -> *mut c_char {
    // SAFETY: forwarded caller contract.
    unsafe {
        mac_string(
            "securebuffer_hmac_with_algorithm",
            handle,
            data,
            data_len,
            |key, data| hmac_with_algorithm(key, data, algorithm),
        )
    }
}

/// Digest length in bytes of `algorithm`; `0` for an unknown id.
#[unsafe(no_mangle)]
pub extern "C" fn securebuffer_hash_output_len(algorithm: u32) -> usize {
    ffi_call(
        "securebuffer_hash_output_len",
        || HashAlgorithm::try_from(algorithm).map(HashAlgorithm::output_len),
        |result| result.unwrap_or(0),
    )
}

/// Fills the buffer's full capacity with PBKDF2-HMAC-SHA256 output.
///
/// # Safety
///
/// `password` and `salt` must be valid for reads of their lengths when the
/// length is non-zero.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn securebuffer_derive_key(
    handle: SecureBufferHandle,
    password: *const u8,
    password_len: usize,
    salt: *const u8,
    salt_len: usize,
    iterations: u32,
) -> i32 {
    status("securebuffer_derive_key", || {
        // SAFETY: forwarded caller contract.
        let (password, salt) = unsafe { (bytes(password, password_len)?, bytes(salt, salt_len)?) };
        with_buffer(handle, |buffer| derive_key(buffer, password, salt, iterations))
    })
}

/// Encrypts `input` with AES-256-GCM under the 32-byte contents of `key`,
/// writing `ciphertext || tag` into `output`.
///
/// # Safety
///
/// `nonce` and `input` must be valid for reads of their lengths when the
/// length is non-zero.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn securebuffer_encrypt_aes256_gcm(
    key: SecureBufferHandle,
    nonce: *const u8,
    nonce_len: usize,
    input: *const u8,
    input_len: usize,
    output: SecureBufferHandle,
) -> i32 {
    status("securebuffer_encrypt_aes256_gcm", || {
        // SAFETY: forwarded caller contract.
        let (nonce, input) = unsafe { (bytes(nonce, nonce_len)?, bytes(input, input_len)?) };
        let output = BUFFERS.get(output)?;
        with_buffer(key, |key| encrypt_aes256_gcm(key, nonce, input, &output))
    })
}

/// Decrypts `ciphertext || tag` into `output`. On a rejected tag `output`
/// keeps its previous contents.
///
/// # Safety
///
/// `nonce` and `input` must be valid for reads of their lengths when the
/// length is non-zero.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn securebuffer_decrypt_aes256_gcm(
    key: SecureBufferHandle,
    nonce: *const u8,
    nonce_len: usize,
    input: *const u8,
    input_len: usize,
    output: SecureBufferHandle,
) -> i32 {
    status("securebuffer_decrypt_aes256_gcm", || {
        // SAFETY: forwarded caller contract.
        let (nonce, input) = unsafe { (bytes(nonce, nonce_len)?, bytes(input, input_len)?) };
        let output = BUFFERS.get(output)?;
        with_buffer(key, |key| decrypt_aes256_gcm(key, nonce, input, &output))
    })
}

// =============================================================================
// Locking
// =============================================================================

/// Takes a shared lock; fails at once if a writer holds the buffer.
#[unsafe(no_mangle)]
pub extern "C" fn securebuffer_acquire_read_lock(handle: SecureBufferHandle) -> i32 {
    status("securebuffer_acquire_read_lock", || {
        with_buffer(handle, SecureBuffer::acquire_read_lock)
    })
}

/// Takes the exclusive lock; fails at once if any lock is held.
#[unsafe(no_mangle)]
pub extern "C" fn securebuffer_acquire_write_lock(handle: SecureBufferHandle) -> i32 {
    status("securebuffer_acquire_write_lock", || {
        with_buffer(handle, SecureBuffer::acquire_write_lock)
    })
}

/// Releases one lock held by the calling thread.
#[unsafe(no_mangle)]
pub extern "C" fn securebuffer_release_lock(handle: SecureBufferHandle) -> i32 {
    status("securebuffer_release_lock", || {
        with_buffer(handle, SecureBuffer::release_lock)
    })
}

/// Whether the buffer accepts locks and cross-thread calls.
#[unsafe(no_mangle)]
pub extern "C" fn securebuffer_is_thread_safe(handle: SecureBufferHandle) -> bool {
    ffi_call(
        "securebuffer_is_thread_safe",
        || with_buffer(handle, |buffer| Ok(buffer.is_thread_safe())),
        |result| result.unwrap_or(false),
    )
}
