// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

//! Security levels and the policy table that drives them.
//!
//! Every level-dependent decision reads its [`LevelPolicy`] row; operations do
//! not branch on [`SecurityLevel`] directly.

use serde::{Deserialize, Serialize};

use crate::error::SecureBufferError;

/// Protection strength chosen at creation. Ordered from weakest to strongest.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum SecurityLevel {
    /// Zeroed on free, no locking.
    #[default]
    Standard = 0,
    /// Locked when possible, verified before reads.
    High = 1,
    /// As `High` with a two-pass wipe.
    Enterprise = 2,
    /// Locking mandatory, pattern wipes, process guard engaged.
    ForensicResistant = 3,
}

impl SecurityLevel {
    /// All levels, weakest first.
    pub const ALL: [SecurityLevel; 4] = [
        SecurityLevel::Standard,
        SecurityLevel::High,
        SecurityLevel::Enterprise,
        SecurityLevel::ForensicResistant,
    ];

    /// Stable C code.
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Stable lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            SecurityLevel::Standard => "standard",
            SecurityLevel::High => "high",
            SecurityLevel::Enterprise => "enterprise",
            SecurityLevel::ForensicResistant => "forensic_resistant",
        }
    }

    /// The policy row for this level.
    pub fn policy(self) -> &'static LevelPolicy {
        &POLICY_TABLE[self as usize]
    }
}

impl TryFrom<i32> for SecurityLevel {
    type Error = SecureBufferError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(SecurityLevel::Standard),
            1 => Ok(SecurityLevel::High),
            2 => Ok(SecurityLevel::Enterprise),
            3 => Ok(SecurityLevel::ForensicResistant),
            _ => Err(SecureBufferError::InvalidSize),
        }
    }
}

/// How strictly a level wants its memory locked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockRequirement {
    /// Never locked at creation.
    None,
    /// Locked if the OS allows it; refusal is logged and tolerated.
    BestEffort,
    /// Refusal fails creation with `AllocationFailed`.
    Required,
}

/// Level-dependent behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelPolicy {
    /// Locking at creation.
    pub lock: LockRequirement,
    /// Verify the checksum before handing out contents.
    pub verify_before_read: bool,
    /// Overwrite passes on zero and free (last pass writes zeros).
    pub wipe_passes: u8,
    /// Ask the kernel to omit the region from core dumps.
    pub exclude_from_dumps: bool,
    /// Engage the process guard on first use.
    pub process_guard: bool,
}

const POLICY_TABLE: [LevelPolicy; 4] = [
    // Standard
    LevelPolicy {
        lock: LockRequirement::None,
        verify_before_read: false,
        wipe_passes: 1,
        exclude_from_dumps: false,
        process_guard: false,
    },
    // High
    LevelPolicy {
        lock: LockRequirement::BestEffort,
        verify_before_read: true,
        wipe_passes: 1,
        exclude_from_dumps: true,
        process_guard: false,
    },
    // Enterprise
    LevelPolicy {
        lock: LockRequirement::BestEffort,
        verify_before_read: true,
        wipe_passes: 2,
        exclude_from_dumps: true,
        process_guard: false,
    },
    // ForensicResistant
    LevelPolicy {
        lock: LockRequirement::Required,
        verify_before_read: true,
        wipe_passes: 4,
        exclude_from_dumps: true,
        process_guard: true,
    },
];
