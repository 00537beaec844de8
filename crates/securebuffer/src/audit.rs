// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

//! Audit trail of security-relevant operations.
//!
//! When enabled, each record is appended as one JSON line to the configured
//! file and kept in a bounded in-memory history used by the compliance
//! report. Records never carry buffer contents.

use std::collections::{BTreeMap, VecDeque};
use std::fs::{File, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SecureBufferError};
use crate::policy::EnterprisePolicy;

/// Records kept in memory; older ones are dropped first.
pub const AUDIT_HISTORY_LIMIT: usize = 10_000;

/// Kind of audited operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEvent {
    /// Buffer created.
    BufferCreated,
    /// Buffer freed or dropped.
    BufferFreed,
    /// Region locked in RAM.
    MemoryLocked,
    /// Region unlocked.
    MemoryUnlocked,
    /// Full capacity zeroed.
    MemoryZeroed,
    /// HMAC, KDF or AEAD call.
    CryptoOperation,
    /// Checksum mismatch or rejected tag.
    IntegrityFailure,
    /// Enterprise policy replaced.
    PolicyChanged,
    /// Audit logging turned on.
    AuditEnabled,
    /// Audit logging turned off.
    AuditDisabled,
}

/// One audit entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// UTC time of the operation.
    pub timestamp: DateTime<Utc>,
    /// What happened.
    pub event: AuditEvent,
    /// Buffer involved, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buffer_id: Option<u64>,
    /// Operation name.
    pub operation: String,
    /// Whether the operation succeeded.
    pub success: bool,
}

#[derive(Debug, Default)]
struct AuditState {
    destination: Option<PathBuf>,
    file: Option<File>,
    history: VecDeque<AuditRecord>,
    write_failures: u64,
}

/// Toggleable audit sink.
#[derive(Debug, Default)]
pub struct AuditLog {
    enabled: AtomicBool,
    state: Mutex<AuditState>,
}

impl AuditLog {
    /// Disabled log with empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts appending records to `path`, creating it if needed.
    ///
    /// Re-enabling switches the destination.
    pub fn enable(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if path.as_os_str().is_empty() {
            return Err(SecureBufferError::InvalidSize);
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|err| {
                tracing::warn!(path = %path.display(), error = %err, "cannot open audit log");
                SecureBufferError::InvalidSize
            })?;

        {
            let mut state = self.state.lock();
            state.destination = Some(path.to_path_buf());
            state.file = Some(file);
        }

        self.enabled.store(true, Ordering::Release);
        self.record(AuditEvent::AuditEnabled, None, "enable_audit_logging", true);

        tracing::debug!(path = %path.display(), "audit logging enabled");

        Ok(())
    }

    /// Stops recording and closes the destination. History is kept.
    pub fn disable(&self) {
        self.record(AuditEvent::AuditDisabled, None, "disable_audit_logging", true);
        self.enabled.store(false, Ordering::Release);

        let mut state = self.state.lock();
        state.file = None;
        state.destination = None;

        tracing::debug!("audit logging disabled");
    }

    /// Whether records are currently written.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Current destination file.
    pub fn destination(&self) -> Option<PathBuf> {
        self.state.lock().destination.clone()
    }

    /// Copy of the in-memory history, oldest first.
    pub fn records(&self) -> Vec<AuditRecord> {
        self.state.lock().history.iter().cloned().collect()
    }

    pub(crate) fn record(
        &self,
        event: AuditEvent,
        buffer_id: Option<u64>,
        operation: &str,
        success: bool,
    ) {
        if !self.is_enabled() {
            return;
        }

        let record = AuditRecord {
            timestamp: Utc::now(),
            event,
            buffer_id,
            operation: operation.to_owned(),
            success,
        };

        let mut guard = self.state.lock();
        let state = &mut *guard;

        if let Some(file) = state.file.as_mut() {
            let written = serde_json::to_string(&record)
                .map_err(std::io::Error::other)
                .and_then(|line| writeln!(file, "{line}"));

            if let Err(err) = written {
                state.write_failures += 1;
                tracing::warn!(error = %err, "audit record not persisted");
            }
        }

        if state.history.len() == AUDIT_HISTORY_LIMIT {
            state.history.pop_front();
        }
        state.history.push_back(record);
    }

    /// Summarizes the history against `policy`.
    pub fn compliance_report(&self, policy: &EnterprisePolicy) -> ComplianceReport {
        let enabled = self.is_enabled();
        let state = self.state.lock();

        let mut events = BTreeMap::new();
        let mut failed_operations = 0;
        for record in &state.history {
            *events.entry(record.event).or_insert(0u64) += 1;
            if !record.success {
                failed_operations += 1;
            }
        }

        let integrity_failures = events
            .get(&AuditEvent::IntegrityFailure)
            .copied()
            .unwrap_or(0);

        let mut violations = Vec::new();
        if policy.require_audit_logging && !enabled {
            violations.push(String::from("audit logging is required but disabled"));
        }
        if state.write_failures > 0 {
            violations.push(format!(
                "{} audit records could not be persisted",
                state.write_failures
            ));
        }

        ComplianceReport {
            generated_at: Utc::now(),
            audit_logging_enabled: enabled,
            audit_destination: state
                .destination
                .as_ref()
                .map(|path| path.display().to_string()),
            total_records: state.history.len(),
            events,
            integrity_failures,
            failed_operations,
            first_record_at: state.history.front().map(|r| r.timestamp),
            last_record_at: state.history.back().map(|r| r.timestamp),
            write_failures: state.write_failures,
            policy: policy.clone(),
            compliant: violations.is_empty(),
            violations,
        }
    }
}

/// Audit summary returned by `get_compliance_report`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComplianceReport {
    /// When the report was produced.
    pub generated_at: DateTime<Utc>,
    /// Audit logging state at report time.
    pub audit_logging_enabled: bool,
    /// Destination file, if enabled.
    pub audit_destination: Option<String>,
    /// Records in the in-memory history.
    pub total_records: usize,
    /// Record count per event kind.
    pub events: BTreeMap<AuditEvent, u64>,
    /// `IntegrityFailure` records.
    pub integrity_failures: u64,
    /// Records with `success == false`.
    pub failed_operations: u64,
    /// Oldest record kept.
    pub first_record_at: Option<DateTime<Utc>>,
    /// Newest record.
    pub last_record_at: Option<DateTime<Utc>>,
    /// Records that could not be written to the destination.
    pub write_failures: u64,
    /// Policy evaluated.
    pub policy: EnterprisePolicy,
    /// `violations` is empty.
    pub compliant: bool,
    /// Human-readable policy violations.
    pub violations: Vec<String>,
}

impl ComplianceReport {
    /// Pretty-printed JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| String::from("{}"))
    }
}
