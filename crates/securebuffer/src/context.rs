// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

//! Shared services injected into buffers: metrics, audit and policy.
//!
//! [`Context::global`] is the process-wide instance used by the C surface and
//! by `SecureBuffer::create`. Tests build isolated contexts with
//! [`Context::new`].

use std::path::Path;
use std::sync::{Arc, OnceLock};

use crate::audit::{AuditEvent, AuditLog, ComplianceReport};
use crate::error::{Result, SecureBufferError, record};
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::policy::{EnterprisePolicy, PolicyStore};

static GLOBAL: OnceLock<Arc<Context>> = OnceLock::new();

/// Metrics, audit log and enterprise policy observed by a set of buffers.
#[derive(Debug, Default)]
pub struct Context {
    metrics: Metrics,
    audit: AuditLog,
    policy: PolicyStore,
}

impl Context {
    /// Fresh, isolated context.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// The process-wide context, created on first use.
    pub fn global() -> &'static Arc<Context> {
        GLOBAL.get_or_init(Context::new)
    }

    /// Counters.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Audit sink.
    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    /// Active enterprise policy.
    pub fn policy(&self) -> Arc<EnterprisePolicy> {
        self.policy.current()
    }

    /// Snapshot of the counters.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Zeroes cumulative counters without touching live buffers.
    pub fn reset_metrics(&self) {
        self.metrics.reset();
    }

    /// Validates `json` and applies it; on error the previous policy stays.
    pub fn set_enterprise_policy(&self, json: &str) -> Result<()> {
        let outcome = self.policy.replace_json(json).map(|policy| {
            tracing::debug!(
                minimum_security_level = policy.minimum_security_level.as_str(),
                require_audit_logging = policy.require_audit_logging,
                require_memory_lock = policy.require_memory_lock,
                "enterprise policy applied"
            );
        });

        self.audit.record(
            AuditEvent::PolicyChanged,
            None,
            "set_enterprise_policy",
            outcome.is_ok(),
        );

        record(outcome)
    }

    /// Replaces the policy with an already built value.
    pub fn apply_policy(&self, policy: EnterprisePolicy) -> Result<()> {
        let outcome = self.policy.replace(policy).map(|_| ());
        self.audit.record(
            AuditEvent::PolicyChanged,
            None,
            "set_enterprise_policy",
            outcome.is_ok(),
        );

        record(outcome)
    }

    /// Starts audit logging to `path`.
    pub fn enable_audit_logging(&self, path: impl AsRef<Path>) -> Result<()> {
        record(self.audit.enable(path))
    }

    /// Stops audit logging unless the policy requires it.
    pub fn disable_audit_logging(&self) -> Result<()> {
        if self.policy().require_audit_logging {
            tracing::warn!("audit logging is required by policy; disable refused");
            return record(Err(SecureBufferError::InvalidSize));
        }

        self.audit.disable();

        record(Ok(()))
    }

    /// Whether audit logging is on.
    pub fn is_audit_logging_enabled(&self) -> bool {
        self.audit.is_enabled()
    }

    /// Audit summary under the active policy.
    pub fn compliance_report(&self) -> ComplianceReport {
        self.audit.compliance_report(&self.policy())
    }
}
