// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

//! Status codes, the FFI last-error slot and panic containment.

use std::cell::Cell;
use std::ffi::{CStr, c_char};
use std::panic::{AssertUnwindSafe, catch_unwind};

use securebuffer::{SUCCESS, SecureBufferError};

thread_local! {
    static LAST_ERROR: Cell<i32> = const { Cell::new(SUCCESS) };
}

pub(crate) fn set_last_error(code: i32) {
    LAST_ERROR.with(|cell| cell.set(code));
}

pub(crate) fn code_of<T>(result: &Result<T, SecureBufferError>) -> i32 {
    result.as_ref().map_or_else(|err| err.code(), |_| SUCCESS)
}

/// Runs `f`, records its outcome and converts it with `convert`.
///
/// A panic inside `f` is contained and reported as `CryptoOperationFailed`.
pub(crate) fn ffi_call<T, R>(
    name: &'static str,
    f: impl FnOnce() -> Result<T, SecureBufferError>,
    convert: impl FnOnce(Result<T, SecureBufferError>) -> R,
) -> R {
    let result = catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|_| {
        tracing::error!(function = name, "panic contained at the C boundary");
        Err(SecureBufferError::CryptoOperationFailed)
    });

    set_last_error(code_of(&result));
    convert(result)
}

/// [`ffi_call`] for functions returning a status code.
pub(crate) fn status(name: &'static str, f: impl FnOnce() -> Result<(), SecureBufferError>) -> i32 {
    ffi_call(name, f, |result| code_of(&result))
}

/// Outcome of the most recent call on this thread (`0` on success).
#[unsafe(no_mangle)]
pub extern "C" fn securebuffer_get_last_error() -> i32 {
    LAST_ERROR.with(Cell::get)
}

/// Resets this thread's last error to `0`.
#[unsafe(no_mangle)]
pub extern "C" fn securebuffer_clear_last_error() {
    set_last_error(SUCCESS);
}

/// Static, NUL-terminated description of `code`. Never null; do not free.
#[unsafe(no_mangle)]
pub extern "C" fn securebuffer_error_string(code: i32) -> *const c_char {
    let text: &'static CStr = match SecureBufferError::from_code(code) {
        Some(SecureBufferError::NullPointer) => c"Null pointer",
        Some(SecureBufferError::InvalidSize) => c"Invalid size",
        Some(SecureBufferError::AllocationFailed) => c"Allocation failed",
        Some(SecureBufferError::BufferOverflow) => c"Buffer overflow",
        Some(SecureBufferError::IntegrityCheckFailed) => c"Integrity check failed",
        Some(SecureBufferError::CryptoOperationFailed) => c"Crypto operation failed",
        Some(SecureBufferError::ThreadSafetyViolation) => c"Thread safety violation",
        None if code == SUCCESS => c"Success",
        None => c"Unknown error",
    };

    text.as_ptr()
}

