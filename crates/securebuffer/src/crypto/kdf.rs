// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

use sha2::Sha256;
use zeroize::Zeroizing;

use super::instrumented;
use crate::buffer::SecureBuffer;
use crate::error::{Result, SecureBufferError};

/// PBKDF2-HMAC-SHA256 iteration floor. Enterprise policy may raise it.
pub const MIN_KDF_ITERATIONS: u32 = 10_000;

/// Fills the whole capacity of `buffer` with PBKDF2-HMAC-SHA256 output.
///
/// Afterwards `buffer.len() == buffer.capacity()`. Iterations below the
/// effective floor and an empty salt are rejected with `InvalidSize`.
pub fn derive_key(
    buffer: &SecureBuffer,
    password: &[u8],
    salt: &[u8],
    iterations: u32,
) -> Result<()> {
    instrumented(buffer, "derive_key", || {
        let floor = buffer.context().policy().effective_kdf_iterations();

        if iterations < floor {
            tracing::warn!(
                buffer_id = buffer.id(),
                iterations,
                floor,
                "key derivation below iteration floor"
            );
            return Err(SecureBufferError::InvalidSize);
        }
        if salt.is_empty() {
            return Err(SecureBufferError::InvalidSize);
        }

        let mut derived = Zeroizing::new(vec![0u8; buffer.capacity()]);
        pbkdf2::pbkdf2_hmac::<Sha256>(password, salt, iterations, &mut derived);

        buffer.fill(&derived)
    })
}
