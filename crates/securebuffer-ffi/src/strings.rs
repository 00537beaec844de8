// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

//! Raw argument and C string conversions.

use std::ffi::{CStr, CString, c_char};

use securebuffer::SecureBufferError;

/// Borrows `len` bytes at `ptr`. A zero length accepts a null pointer.
///
/// # Safety
///
/// If `len > 0`, `ptr` must be valid for reads of `len` bytes for `'a`.
pub(crate) unsafe fn bytes<'a>(ptr: *const u8, len: usize) -> Result<&'a [u8], SecureBufferError> {
    if len == 0 {
        return Ok(&[]);
    }
    if ptr.is_null() {
        return Err(SecureBufferError::NullPointer);
    }

    // SAFETY: non-null and valid for `len` bytes per the caller contract.
    Ok(unsafe { core::slice::from_raw_parts(ptr, len) })
}

/// Borrows a NUL-terminated UTF-8 string.
///
/// # Safety
///
/// `ptr` must be null or point to a NUL-terminated string valid for `'a`.
pub(crate) unsafe fn text<'a>(ptr: *const c_char) -> Result<&'a str, SecureBufferError> {
    if ptr.is_null() {
        return Err(SecureBufferError::NullPointer);
    }

    // SAFETY: non-null and NUL-terminated per the caller contract.
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map_err(|_| SecureBufferError::InvalidSize)
}

/// Hands `value` to C. Null if it contains an interior NUL.
pub(crate) fn into_raw(value: String) -> *mut c_char {
    CString::new(value).map_or(core::ptr::null_mut(), CString::into_raw)
}

/// Releases a string returned by this library. Null is ignored.
///
/// # Safety
///
/// `s` must be null or a pointer returned by a `securebuffer_*` or
/// `securechannel_pool_*` function that has not been freed yet.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn securebuffer_free_cstr(s: *mut c_char) {
    if s.is_null() {
        return;
    }

    // SAFETY: `s` came from `CString::into_raw` per the caller contract.
    drop(unsafe { CString::from_raw(s) });
}

