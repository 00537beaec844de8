// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

//! Error taxonomy and the per-thread last-error channel.

use std::cell::Cell;

use securebuffer_region::RegionError;
use thiserror::Error;

/// Code reported for a successful call.
pub const SUCCESS: i32 = 0;

/// The closed set of failures. Discriminants are the stable C codes.
#[derive(Debug, Error, Clone, Copy, Eq, PartialEq, Hash)]
#[repr(i32)]
pub enum SecureBufferError {
    /// Handle is null, freed, or unknown.
    #[error("Null pointer")]
    NullPointer = -1,

    /// Size, length or argument outside the accepted range.
    #[error("Invalid size")]
    InvalidSize = -2,

    /// The protected region could not be reserved or locked.
    #[error("Allocation failed")]
    AllocationFailed = -3,

    /// Data does not fit the destination capacity.
    #[error("Buffer overflow")]
    BufferOverflow = -4,

    /// Checksum mismatch or authentication tag rejected.
    #[error("Integrity check failed")]
    IntegrityCheckFailed = -5,

    /// Crypto primitive, algorithm id, or channel failure.
    #[error("Crypto operation failed")]
    CryptoOperationFailed = -6,

    /// Lock discipline violated.
    #[error("Thread safety violation")]
    ThreadSafetyViolation = -7,
}

impl SecureBufferError {
    /// Stable C code (always negative).
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Inverse of [`SecureBufferError::code`]. `0` and unknown codes map to `None`.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            -1 => Some(Self::NullPointer),
            -2 => Some(Self::InvalidSize),
            -3 => Some(Self::AllocationFailed),
            -4 => Some(Self::BufferOverflow),
            -5 => Some(Self::IntegrityCheckFailed),
            -6 => Some(Self::CryptoOperationFailed),
            -7 => Some(Self::ThreadSafetyViolation),
            _ => None,
        }
    }

    /// Static human-readable description.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NullPointer => "Null pointer",
            Self::InvalidSize => "Invalid size",
            Self::AllocationFailed => "Allocation failed",
            Self::BufferOverflow => "Buffer overflow",
            Self::IntegrityCheckFailed => "Integrity check failed",
            Self::CryptoOperationFailed => "Crypto operation failed",
            Self::ThreadSafetyViolation => "Thread safety violation",
        }
    }

    /// Caller may retry with corrected usage.
    pub fn is_recoverable(self) -> bool {
        matches!(self, Self::ThreadSafetyViolation | Self::BufferOverflow)
    }
}

impl From<RegionError> for SecureBufferError {
    fn from(err: RegionError) -> Self {
        match err {
            RegionError::InvalidCapacity => Self::InvalidSize,
            _ => Self::AllocationFailed,
        }
    }
}

/// Maps any code, including [`SUCCESS`], to its stable string.
///
/// # Example
///
/// ```
/// use securebuffer::error_string;
///
/// assert_eq!(error_string(0), "Success");
/// assert_eq!(error_string(-4), "Buffer overflow");
/// assert_eq!(error_string(42), "Unknown error");
/// ```
pub fn error_string(code: i32) -> &'static str {
    if code == SUCCESS {
        return "Success";
    }

    SecureBufferError::from_code(code).map_or("Unknown error", SecureBufferError::as_str)
}

/// Crate-wide result alias.
pub type Result<T, E = SecureBufferError> = core::result::Result<T, E>;

thread_local! {
    static LAST_ERROR: Cell<Option<SecureBufferError>> = const { Cell::new(None) };
}

/// Outcome of the most recent fallible call on this thread.
pub fn last_error() -> Option<SecureBufferError> {
    LAST_ERROR.with(Cell::get)
}

/// Clears this thread's last error.
pub fn clear_last_error() {
    LAST_ERROR.with(|cell| cell.set(None));
}

/// Stores the outcome of `result` as this thread's last error and passes it on.
pub(crate) fn record<T>(result: Result<T>) -> Result<T> {
    let outcome = result.as_ref().err().copied();
    LAST_ERROR.with(|cell| cell.set(outcome));

    result
}

/// Puts back a previously observed last error.
pub(crate) fn restore_last_error(saved: Option<SecureBufferError>) {
    LAST_ERROR.with(|cell| cell.set(saved));
}
