// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Sha256, Sha512};
use zeroize::Zeroize;

use super::instrumented;
use crate::buffer::SecureBuffer;
use crate::error::{Result, SecureBufferError};

/// Domain separation for turning an arbitrary-length key into a BLAKE3 key.
const BLAKE3_KEY_CONTEXT: &str = "securebuffer 2024-01-01 hmac-blake3 key";

/// MAC algorithm. Discriminants are the stable C ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u32)]
pub enum HashAlgorithm {
    /// HMAC-SHA-256.
    Sha256 = 0,
    /// HMAC-SHA-512.
    Sha512 = 1,
    /// BLAKE3 keyed hash.
    Blake3 = 2,
}

impl HashAlgorithm {
    /// Stable C id.
    pub fn id(self) -> u32 {
        self as u32
    }

    /// Digest length in bytes.
    pub fn output_len(self) -> usize {
        match self {
            HashAlgorithm::Sha256 | HashAlgorithm::Blake3 => 32,
            HashAlgorithm::Sha512 => 64,
        }
    }
}

impl TryFrom<u32> for HashAlgorithm {
    type Error = SecureBufferError;

    fn try_from(id: u32) -> Result<Self> {
        match id {
            0 => Ok(HashAlgorithm::Sha256),
            1 => Ok(HashAlgorithm::Sha512),
            2 => Ok(HashAlgorithm::Blake3),
            _ => Err(SecureBufferError::CryptoOperationFailed),
        }
    }
}

/// Text encoding for digests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestEncoding {
    /// Lowercase hex.
    Hex,
    /// URL-safe base64 without padding.
    Base64Url,
}

/// MAC output.
#[derive(Clone, PartialEq, Eq)]
pub struct Digest {
    bytes: Vec<u8>,
}

impl Digest {
    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Lowercase hex.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    /// URL-safe base64, unpadded.
    pub fn to_base64url(&self) -> String {
        URL_SAFE_NO_PAD.encode(&self.bytes)
    }

    /// Encodes with `encoding`.
    pub fn encode(&self, encoding: DigestEncoding) -> String {
        match encoding {
            DigestEncoding::Hex => self.to_hex(),
            DigestEncoding::Base64Url => self.to_base64url(),
        }
    }
}

impl core::fmt::Debug for Digest {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("Digest").field(&self.to_hex()).finish()
    }
}

fn compute(key: &[u8], data: &[u8], algorithm: HashAlgorithm) -> Result<Vec<u8>> {
    if key.is_empty() {
        return Err(SecureBufferError::InvalidSize);
    }

    let bytes = match algorithm {
        HashAlgorithm::Sha256 => {
            let mut mac = Hmac::<Sha256>::new_from_slice(key)
                .map_err(|_| SecureBufferError::CryptoOperationFailed)?;
            mac.update(data);
            mac.finalize().into_bytes().to_vec()
        }
        HashAlgorithm::Sha512 => {
            let mut mac = Hmac::<Sha512>::new_from_slice(key)
                .map_err(|_| SecureBufferError::CryptoOperationFailed)?;
            mac.update(data);
            mac.finalize().into_bytes().to_vec()
        }
        HashAlgorithm::Blake3 => {
            let mut derived = blake3::derive_key(BLAKE3_KEY_CONTEXT, key);
            let hash = blake3::keyed_hash(&derived, data);
            derived.zeroize();
            hash.as_bytes().to_vec()
        }
    };

    Ok(bytes)
}

/// MAC of `data` keyed by the contents of `key`.
///
/// Deterministic and side-effect free on the buffer. An empty key is
/// `InvalidSize`.
///
/// # Example
///
/// ```
/// use securebuffer::{HashAlgorithm, SecureBuffer, hmac};
///
/// let key = SecureBuffer::new(32).expect("create");
/// key.copy(b"key").expect("copy");
///
/// let digest = hmac(&key, b"The quick brown fox jumps over the lazy dog", HashAlgorithm::Sha256)
///     .expect("hmac");
/// assert_eq!(
///     digest.to_hex(),
///     "f7bc83f430538424b13298e6aa6fb143ef4d59a14946175997479dbc2d1a3cd8"
/// );
/// ```
pub fn hmac(key: &SecureBuffer, data: &[u8], algorithm: HashAlgorithm) -> Result<Digest> {
    instrumented(key, "hmac", || {
        let secret = key.expose("hmac")?;
        let bytes = compute(&secret, data, algorithm)?;

        Ok(Digest { bytes })
    })
}

/// [`hmac`] rendered with `encoding`.
pub fn hmac_encoded(
    key: &SecureBuffer,
    data: &[u8],
    algorithm: HashAlgorithm,
    encoding: DigestEncoding,
) -> Result<String> {
    hmac(key, data, algorithm).map(|digest| digest.encode(encoding))
}

/// HMAC-SHA-256 as lowercase hex.
pub fn hmac_hex(key: &SecureBuffer, data: &[u8]) -> Result<String> {
    hmac_encoded(key, data, HashAlgorithm::Sha256, DigestEncoding::Hex)
}

/// HMAC-SHA-256 as unpadded base64url.
pub fn hmac_base64url(key: &SecureBuffer, data: &[u8]) -> Result<String> {
    hmac_encoded(key, data, HashAlgorithm::Sha256, DigestEncoding::Base64Url)
}

/// Hex MAC for a raw algorithm id; unknown ids are `CryptoOperationFailed`.
pub fn hmac_with_algorithm(key: &SecureBuffer, data: &[u8], algorithm: u32) -> Result<String> {
    let algorithm = crate::error::record(HashAlgorithm::try_from(algorithm))?;

    hmac_encoded(key, data, algorithm, DigestEncoding::Hex)
}
