// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

//! Multi-pass wiping.

use core::ptr;
use core::sync::atomic::{Ordering, compiler_fence};

use zeroize::Zeroize;

/// Patterns written before the final zero pass.
const WIPE_PATTERNS: [u8; 3] = [0xFF, 0xAA, 0x55];

/// Overwrites `bytes` `passes` times, the last pass always writing zeros.
///
/// `passes == 0` is treated as a single zero pass.
///
/// # Example
///
/// ```
/// use securebuffer_region::{is_zeroized, wipe};
///
/// let mut secret = *b"hunter2";
/// wipe(&mut secret, 3);
/// assert!(is_zeroized(&secret));
/// ```
pub fn wipe(bytes: &mut [u8], passes: u8) {
    for pass in 1..passes {
        volatile_fill(bytes, WIPE_PATTERNS[(pass as usize - 1) % WIPE_PATTERNS.len()]);
    }

    bytes.zeroize();
}

/// Returns `true` if every byte is zero.
#[inline(always)]
pub fn is_zeroized(bytes: &[u8]) -> bool {
    bytes.iter().all(|&b| b == 0)
}

#[inline(never)]
fn volatile_fill(bytes: &mut [u8], pattern: u8) {
    for byte in bytes.iter_mut() {
        // SAFETY: `byte` is a valid, aligned, exclusive reference.
        unsafe { ptr::write_volatile(byte, pattern) };
    }

    compiler_fence(Ordering::SeqCst);
}
