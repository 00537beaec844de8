// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

use crate::error::SecureBufferError;
use crate::level::{LockRequirement, SecurityLevel};

#[test]
fn test_level_codes_roundtrip() {
    for level in SecurityLevel::ALL {
        assert_eq!(SecurityLevel::try_from(level.code()), Ok(level));
    }
}

#[test]
fn test_level_unknown_code() {
    assert_eq!(
        SecurityLevel::try_from(4),
        Err(SecureBufferError::InvalidSize)
    );
    assert_eq!(
        SecurityLevel::try_from(-1),
        Err(SecureBufferError::InvalidSize)
    );
}

#[test]
fn test_levels_are_ordered() {
    assert!(SecurityLevel::Standard < SecurityLevel::High);
    assert!(SecurityLevel::High < SecurityLevel::Enterprise);
    assert!(SecurityLevel::Enterprise < SecurityLevel::ForensicResistant);
    assert_eq!(SecurityLevel::default(), SecurityLevel::Standard);
}

#[test]
fn test_level_serde_names() {
    let json = serde_json::to_string(&SecurityLevel::ForensicResistant)
        .expect("Failed to serialize");

    assert_eq!(json, "\"forensic_resistant\"");
    assert_eq!(SecurityLevel::ForensicResistant.as_str(), "forensic_resistant");

    let level: SecurityLevel = serde_json::from_str("\"high\"").expect("Failed to deserialize");
    assert_eq!(level, SecurityLevel::High);
}

#[test]
fn test_policy_table_rows() {
    let standard = SecurityLevel::Standard.policy();
    assert_eq!(standard.lock, LockRequirement::None);
    assert!(!standard.verify_before_read);

    let high = SecurityLevel::High.policy();
    assert_eq!(high.lock, LockRequirement::BestEffort);
    assert!(high.verify_before_read);
    assert!(high.exclude_from_dumps);

    let forensic = SecurityLevel::ForensicResistant.policy();
    assert_eq!(forensic.lock, LockRequirement::Required);
    assert!(forensic.process_guard);
}

#[test]
fn test_wipe_passes_never_decrease() {
    let passes: Vec<u8> = SecurityLevel::ALL
        .iter()
        .map(|level| level.policy().wipe_passes)
        .collect();

    assert!(passes.windows(2).all(|pair| pair[0] <= pair[1]));
    assert!(passes.iter().all(|&p| p >= 1));
}
