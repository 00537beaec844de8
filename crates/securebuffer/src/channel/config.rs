// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

//! Pool configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SecureBufferError};

/// Tuning for a [`SecureChannelPool`](super::SecureChannelPool).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PoolConfig {
    /// Upper bound on concurrently held connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// Connection establishment timeout in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Per-request read/write timeout in milliseconds. Expiry counts as a
    /// transport failure.
    #[serde(default = "default_io_timeout_ms")]
    pub io_timeout_ms: u64,

    /// `is_healthy` is true at or above this score.
    #[serde(default = "default_healthy_threshold")]
    pub healthy_threshold: f64,

    /// Factor applied to the score on each failure.
    #[serde(default = "default_failure_decay")]
    pub failure_decay: f64,

    /// Fraction of the remaining distance to 1.0 recovered on each success.
    #[serde(default = "default_recovery_rate")]
    pub recovery_rate: f64,

    /// Largest response frame accepted from the transport.
    #[serde(default = "default_max_response_size")]
    pub max_response_size: usize,
}

fn default_max_connections() -> usize {
    4
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

fn default_io_timeout_ms() -> u64 {
    10_000
}

fn default_healthy_threshold() -> f64 {
    0.5
}

fn default_failure_decay() -> f64 {
    0.5
}

fn default_recovery_rate() -> f64 {
    0.2
}

fn default_max_response_size() -> usize {
    1 << 20
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            connect_timeout_ms: default_connect_timeout_ms(),
            io_timeout_ms: default_io_timeout_ms(),
            healthy_threshold: default_healthy_threshold(),
            failure_decay: default_failure_decay(),
            recovery_rate: default_recovery_rate(),
            max_response_size: default_max_response_size(),
        }
    }
}

impl PoolConfig {
    /// Starts a builder from the defaults.
    pub fn builder() -> PoolConfigBuilder {
        PoolConfigBuilder::default()
    }

    /// Connect timeout as a `Duration`.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// I/O timeout as a `Duration`.
    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }

    /// Rejects zero sizes, zero timeouts and out-of-range factors.
    pub fn validate(&self) -> Result<()> {
        let unit = |value: f64| (0.0..=1.0).contains(&value);

        let valid = self.max_connections > 0
            && self.connect_timeout_ms > 0
            && self.io_timeout_ms > 0
            && self.max_response_size > 0
            && unit(self.healthy_threshold)
            && unit(self.failure_decay)
            && unit(self.recovery_rate);

        if !valid {
            return Err(SecureBufferError::InvalidSize);
        }

        Ok(())
    }
}

/// Builder for [`PoolConfig`].
#[derive(Debug, Default)]
pub struct PoolConfigBuilder {
    config: PoolConfig,
}

impl PoolConfigBuilder {
    /// Sets `max_connections`.
    pub fn max_connections(mut self, max_connections: usize) -> Self {
        self.config.max_connections = max_connections;
        self
    }

    /// Sets the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Sets the I/O timeout.
    pub fn io_timeout(mut self, timeout: Duration) -> Self {
        self.config.io_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Sets `healthy_threshold`.
    pub fn healthy_threshold(mut self, threshold: f64) -> Self {
        self.config.healthy_threshold = threshold;
        self
    }

    /// Sets `failure_decay`.
    pub fn failure_decay(mut self, decay: f64) -> Self {
        self.config.failure_decay = decay;
        self
    }

    /// Sets `recovery_rate`.
    pub fn recovery_rate(mut self, rate: f64) -> Self {
        self.config.recovery_rate = rate;
        self
    }

    /// Sets `max_response_size`.
    pub fn max_response_size(mut self, size: usize) -> Self {
        self.config.max_response_size = size;
        self
    }

    /// Finishes the builder. Validation happens when the pool is created.
    pub fn build(self) -> PoolConfig {
        self.config
    }
}
