// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

//! C interface for `securebuffer`.
//!
//! Buffers and pools are exposed as opaque 64-bit handles. `0` is never a
//! valid handle, and a freed handle is never handed out again, so a stale
//! handle fails with `SECUREBUFFER_ERROR_NULL_POINTER` instead of aliasing a
//! newer object.
//!
//! Every function:
//!
//! - records its outcome as the calling thread's last error
//!   (`securebuffer_get_last_error`);
//! - catches panics, which surface as `SECUREBUFFER_ERROR_CRYPTO_OPERATION_FAILED`
//!   or the function's null/sentinel value.
//!
//! Strings returned as `*mut c_char` are owned by the caller and must be
//! released with `securebuffer_free_cstr`.
//!
//! The matching header lives in `include/securebuffer.h`.

#![warn(missing_docs)]
#![warn(unsafe_op_in_unsafe_fn)]

#[cfg(test)]
mod tests;

mod buffer;
mod diagnostics;
mod error;
mod handles;
mod pool;
mod strings;

pub use buffer::*;
pub use diagnostics::*;
pub use error::{
    securebuffer_clear_last_error, securebuffer_error_string, securebuffer_get_last_error,
};
pub use handles::{SecureBufferHandle, SecureChannelPoolHandle};
pub use pool::*;
pub use strings::securebuffer_free_cstr;
