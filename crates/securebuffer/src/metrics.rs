// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

//! Lock-free counters observed by every buffer and crypto operation.
//!
//! Snapshots read each counter independently, so a snapshot taken while other
//! threads update is eventually consistent rather than transactionally exact.

use core::fmt::Write as _;
use core::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Running counters.
#[derive(Debug, Default)]
pub struct Metrics {
    total_allocations: AtomicU64,
    total_deallocations: AtomicU64,
    current_active_buffers: AtomicU64,
    peak_active_buffers: AtomicU64,
    total_bytes_allocated: AtomicU64,
    total_bytes_deallocated: AtomicU64,
    integrity_checks_performed: AtomicU64,
    integrity_check_failures: AtomicU64,
    crypto_operations_count: AtomicU64,
    timed_operations: AtomicU64,
    total_operation_time_ns: AtomicU64,
}

impl Metrics {
    /// Zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn on_allocate(&self, bytes: usize) {
        self.total_allocations.fetch_add(1, Ordering::Relaxed);
        self.total_bytes_allocated.fetch_add(bytes as u64, Ordering::Relaxed);

        let active = self.current_active_buffers.fetch_add(1, Ordering::AcqRel) + 1;
        self.peak_active_buffers.fetch_max(active, Ordering::AcqRel);
    }

    pub(crate) fn on_deallocate(&self, bytes: usize) {
        self.total_deallocations.fetch_add(1, Ordering::Relaxed);
        self.total_bytes_deallocated.fetch_add(bytes as u64, Ordering::Relaxed);

        // Saturates: a reset between create and free must not wrap the gauge.
        let _ = self.current_active_buffers.fetch_update(
            Ordering::AcqRel,
            Ordering::Acquire,
            |active| Some(active.saturating_sub(1)),
        );
    }

    pub(crate) fn on_integrity_check(&self, passed: bool) {
        self.integrity_checks_performed.fetch_add(1, Ordering::Relaxed);

        if !passed {
            self.integrity_check_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn on_crypto_operation(&self) {
        self.crypto_operations_count.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn observe(&self, elapsed: Duration) {
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);

        self.total_operation_time_ns.fetch_add(nanos, Ordering::Relaxed);
        self.timed_operations.fetch_add(1, Ordering::Relaxed);
    }

    /// Runs `op` and feeds its wall time into the running average.
    pub(crate) fn timed<T>(&self, op: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let out = op();
        self.observe(start.elapsed());

        out
    }

    /// Point-in-time copy of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let timed = self.timed_operations.load(Ordering::Relaxed);
        let total_ns = self.total_operation_time_ns.load(Ordering::Relaxed);
        let average_operation_time_ns = if timed == 0 {
            0.0
        } else {
            total_ns as f64 / timed as f64
        };

        MetricsSnapshot {
            total_allocations: self.total_allocations.load(Ordering::Relaxed),
            total_deallocations: self.total_deallocations.load(Ordering::Relaxed),
            current_active_buffers: self.current_active_buffers.load(Ordering::Acquire),
            peak_active_buffers: self.peak_active_buffers.load(Ordering::Acquire),
            total_bytes_allocated: self.total_bytes_allocated.load(Ordering::Relaxed),
            total_bytes_deallocated: self.total_bytes_deallocated.load(Ordering::Relaxed),
            integrity_checks_performed: self.integrity_checks_performed.load(Ordering::Relaxed),
            integrity_check_failures: self.integrity_check_failures.load(Ordering::Relaxed),
            average_operation_time_ns,
            crypto_operations_count: self.crypto_operations_count.load(Ordering::Relaxed),
        }
    }

    /// Zeroes cumulative counters.
    ///
    /// Live buffers are untouched: the active gauge is kept and the peak
    /// restarts from it.
    pub fn reset(&self) {
        for counter in [
            &self.total_allocations,
            &self.total_deallocations,
            &self.total_bytes_allocated,
            &self.total_bytes_deallocated,
            &self.integrity_checks_performed,
            &self.integrity_check_failures,
            &self.crypto_operations_count,
            &self.timed_operations,
            &self.total_operation_time_ns,
        ] {
            counter.store(0, Ordering::Relaxed);
        }

        let active = self.current_active_buffers.load(Ordering::Acquire);
        self.peak_active_buffers.store(active, Ordering::Release);
    }
}

/// Immutable copy of [`Metrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Buffers created.
    pub total_allocations: u64,
    /// Buffers freed.
    pub total_deallocations: u64,
    /// Buffers currently alive.
    pub current_active_buffers: u64,
    /// High-water mark of `current_active_buffers`.
    pub peak_active_buffers: u64,
    /// Capacity bytes reserved.
    pub total_bytes_allocated: u64,
    /// Capacity bytes released.
    pub total_bytes_deallocated: u64,
    /// Checksum verifications run.
    pub integrity_checks_performed: u64,
    /// Verifications that found a mismatch.
    pub integrity_check_failures: u64,
    /// Mean wall time of buffer operations (create, copy, mutation, locking,
    /// integrity checks, free) and crypto operations. Reads through
    /// `with_data` and raw pointers are not timed.
    pub average_operation_time_ns: f64,
    /// HMAC, KDF and AEAD calls.
    pub crypto_operations_count: u64,
}

impl MetricsSnapshot {
    /// JSON object with one field per counter.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| String::from("{}"))
    }

    /// Prometheus text exposition under the `securebuffer_` namespace.
    pub fn to_prometheus(&self) -> String {
        let rows: [(&str, &str, &str, String); 10] = [
            ("allocations_total", "counter", "Buffers created", self.total_allocations.to_string()),
            (
                "deallocations_total",
                "counter",
                "Buffers freed",
                self.total_deallocations.to_string(),
            ),
            (
                "active_buffers",
                "gauge",
                "Buffers currently alive",
                self.current_active_buffers.to_string(),
            ),
            (
                "peak_active_buffers",
                "gauge",
                "Peak concurrently alive buffers",
                self.peak_active_buffers.to_string(),
            ),
            (
                "allocated_bytes_total",
                "counter",
                "Capacity bytes reserved",
                self.total_bytes_allocated.to_string(),
            ),
            (
                "deallocated_bytes_total",
                "counter",
                "Capacity bytes released",
                self.total_bytes_deallocated.to_string(),
            ),
            (
                "integrity_checks_total",
                "counter",
                "Checksum verifications",
                self.integrity_checks_performed.to_string(),
            ),
            (
                "integrity_failures_total",
                "counter",
                "Checksum mismatches",
                self.integrity_check_failures.to_string(),
            ),
            (
                "crypto_operations_total",
                "counter",
                "Crypto operations",
                self.crypto_operations_count.to_string(),
            ),
            (
                "average_operation_time_ns",
                "gauge",
                "Mean operation wall time",
                format!("{:.3}", self.average_operation_time_ns),
            ),
        ];

        let mut out = String::new();
        for (name, kind, help, value) in rows {
            let _ = writeln!(out, "# HELP securebuffer_{name} {help}");
            let _ = writeln!(out, "# TYPE securebuffer_{name} {kind}");
            let _ = writeln!(out, "securebuffer_{name} {value}");
        }

        out
    }
}
