// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

//! `securechannel_pool_*` functions.

use std::ffi::c_char;

use securebuffer::{SecureBufferError, SecureChannelPool};

use crate::error::{ffi_call, status};
use crate::handles::{BUFFERS, POOLS, SecureBufferHandle, SecureChannelPoolHandle};
use crate::strings::{bytes, into_raw, text};

fn with_pool<T>(
    handle: SecureChannelPoolHandle,
    f: impl FnOnce(&SecureChannelPool) -> Result<T, SecureBufferError>,
) -> Result<T, SecureBufferError> {
    let pool = POOLS.get(handle)?;
    f(&pool)
}

/// Creates a TCP pool of at most `max_connections` to `endpoint`
/// (`host:port`). Returns `0` on failure.
///
/// # Safety
///
/// `endpoint` must be null or a valid NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn securechannel_pool_new(
    max_connections: usize,
    endpoint: *const c_char,
) -> SecureChannelPoolHandle {
    ffi_call(
        "securechannel_pool_new",
        || {
            // SAFETY: forwarded caller contract.
            let endpoint = unsafe { text(endpoint) }?;
            SecureChannelPool::new(max_connections, endpoint).map(|pool| POOLS.insert(pool))
        },
        |result| result.unwrap_or(0),
    )
}

/// Closes every connection and invalidates the handle.
#[unsafe(no_mangle)]
pub extern "C" fn securechannel_pool_free(handle: SecureChannelPoolHandle) -> i32 {
    status("securechannel_pool_free", || {
        let pool = POOLS.remove(handle).ok_or(SecureBufferError::NullPointer)?;
        pool.close();

        Ok(())
    })
}

/// Sends `len` bytes at `data` and stores the reply in `response`.
///
/// # Safety
///
/// If `len > 0`, `data` must be valid for reads of `len` bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn securechannel_pool_send(
    handle: SecureChannelPoolHandle,
    data: *const u8,
    len: usize,
    response: SecureBufferHandle,
) -> i32 {
    status("securechannel_pool_send", || {
        // SAFETY: forwarded caller contract.
        let data = unsafe { bytes(data, len) }?;
        let response = BUFFERS.get(response)?;
        with_pool(handle, |pool| pool.send(data, &response))
    })
}

/// Whether the pool is open and at or above its health threshold.
#[unsafe(no_mangle)]
pub extern "C" fn securechannel_pool_is_healthy(handle: SecureChannelPoolHandle) -> bool {
    ffi_call(
        "securechannel_pool_is_healthy",
        || with_pool(handle, |pool| Ok(pool.is_healthy())),
        |result| result.unwrap_or(false),
    )
}

/// Health score in `[0.0, 1.0]`; `-1.0` for an invalid handle.
#[unsafe(no_mangle)]
pub extern "C" fn securechannel_pool_get_health_score(handle: SecureChannelPoolHandle) -> f64 {
    ffi_call(
        "securechannel_pool_get_health_score",
        || with_pool(handle, |pool| Ok(pool.health_score())),
        |result| result.unwrap_or(-1.0),
    )
}

/// Pool status as JSON. Free with `securebuffer_free_cstr`. Null on failure.
#[unsafe(no_mangle)]
pub extern "C" fn securechannel_pool_get_status_json(
    handle: SecureChannelPoolHandle,
) -> *mut c_char {
    ffi_call(
        "securechannel_pool_get_status_json",
        || with_pool(handle, |pool| Ok(pool.status_json())),
        |result| result.map_or(core::ptr::null_mut(), into_raw),
    )
}
