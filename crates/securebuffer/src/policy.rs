// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

//! Enterprise policy: process-wide constraints layered over the level table.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::buffer::MAX_BUFFER_SIZE;
use crate::crypto::MIN_KDF_ITERATIONS;
use crate::error::{Result, SecureBufferError};
use crate::level::{LockRequirement, SecurityLevel};

/// Constraints applied to every buffer created under a context.
///
/// Missing fields take their defaults; unknown fields are rejected.
///
/// # Example
///
/// ```
/// use securebuffer::{EnterprisePolicy, SecurityLevel};
///
/// let policy = EnterprisePolicy::from_json(r#"{"minimum_security_level":"high"}"#)
///     .expect("valid policy");
/// assert_eq!(policy.minimum_security_level, SecurityLevel::High);
/// assert!(EnterprisePolicy::from_json(r#"{"bogus":true}"#).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EnterprisePolicy {
    /// Requests below this level are raised to it.
    pub minimum_security_level: SecurityLevel,
    /// Audit logging must stay enabled once turned on.
    pub require_audit_logging: bool,
    /// Raises the KDF floor; never lowers it below [`MIN_KDF_ITERATIONS`].
    pub min_kdf_iterations: u32,
    /// Largest capacity accepted by `create`.
    pub max_buffer_size: usize,
    /// Every buffer must be locked in RAM at creation.
    pub require_memory_lock: bool,
}

impl Default for EnterprisePolicy {
    fn default() -> Self {
        Self {
            minimum_security_level: SecurityLevel::Standard,
            require_audit_logging: false,
            min_kdf_iterations: MIN_KDF_ITERATIONS,
            max_buffer_size: MAX_BUFFER_SIZE,
            require_memory_lock: false,
        }
    }
}

impl EnterprisePolicy {
    /// Parses and validates a policy document.
    pub fn from_json(json: &str) -> Result<Self> {
        let policy: Self = serde_json::from_str(json).map_err(|err| {
            tracing::warn!(error = %err, "rejected enterprise policy");
            SecureBufferError::InvalidSize
        })?;

        policy.validate()?;

        Ok(policy)
    }

    /// Checks ranges that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.max_buffer_size == 0 || self.max_buffer_size > MAX_BUFFER_SIZE {
            return Err(SecureBufferError::InvalidSize);
        }

        Ok(())
    }

    /// The level a buffer requested at `requested` is actually created with.
    pub fn effective_level(&self, requested: SecurityLevel) -> SecurityLevel {
        requested.max(self.minimum_security_level)
    }

    /// Locking requirement after applying `require_memory_lock`.
    pub fn effective_lock(&self, level: SecurityLevel) -> LockRequirement {
        if self.require_memory_lock {
            LockRequirement::Required
        } else {
            level.policy().lock
        }
    }

    /// Minimum iteration count `derive_key` accepts.
    pub fn effective_kdf_iterations(&self) -> u32 {
        self.min_kdf_iterations.max(MIN_KDF_ITERATIONS)
    }

    /// Serialized form.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| String::from("{}"))
    }
}

/// Holder with atomic replace-or-reject semantics.
#[derive(Debug, Default)]
pub struct PolicyStore {
    current: RwLock<Arc<EnterprisePolicy>>,
}

impl PolicyStore {
    /// The active policy.
    pub fn current(&self) -> Arc<EnterprisePolicy> {
        Arc::clone(&self.current.read())
    }

    /// Parses `json` and swaps it in. On error the previous policy stays.
    pub fn replace_json(&self, json: &str) -> Result<Arc<EnterprisePolicy>> {
        self.replace(EnterprisePolicy::from_json(json)?)
    }

    /// Validates `policy` and swaps it in. On error the previous policy stays.
    pub fn replace(&self, policy: EnterprisePolicy) -> Result<Arc<EnterprisePolicy>> {
        policy.validate()?;

        let policy = Arc::new(policy);
        *self.current.write() = Arc::clone(&policy);

        Ok(policy)
    }
}
