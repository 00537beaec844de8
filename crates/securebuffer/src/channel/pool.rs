// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

//! SecureChannelPool - bounded, lazily connected channels to one endpoint.
//!
//! The pool owns `max_connections` slots. A `send` claims one slot with a
//! compare-and-swap, preferring slots that already hold a live channel, and
//! connects lazily otherwise. When every slot is claimed the call fails at
//! once (no queueing) with `CryptoOperationFailed`.
//!
//! Health is a score in [0.0, 1.0]: each transport failure multiplies it by
//! `failure_decay`, each success recovers `recovery_rate` of the distance
//! to 1.0.

use core::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::io;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::config::PoolConfig;
use super::transport::{Channel, Connector, TcpConnector};
use crate::buffer::SecureBuffer;
use crate::error::{Result, SecureBufferError, record};

#[derive(Debug, Default)]
struct Slot {
    claimed: AtomicBool,
    connected: AtomicBool,
    channel: Mutex<Option<Box<dyn Channel>>>,
    connects: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    last_activity_ms: AtomicU64,
}

impl Slot {
    fn try_claim(&self) -> bool {
        self.claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn touch(&self) {
        let now = u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0);
        self.last_activity_ms.store(now, Ordering::Relaxed);
    }

    fn disconnect(&self, channel: &mut Option<Box<dyn Channel>>) {
        *channel = None;
        self.connected.store(false, Ordering::Release);
    }
}

/// Exclusive use of one slot; released on drop.
pub(crate) struct Claim<'a> {
    index: usize,
    slot: &'a Slot,
    in_flight: &'a AtomicUsize,
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
        self.slot.claimed.store(false, Ordering::Release);
    }
}

/// Reusable secured connections to a single endpoint.
pub struct SecureChannelPool {
    endpoint: String,
    config: PoolConfig,
    connector: Arc<dyn Connector>,
    slots: Box<[Slot]>,
    health_bits: AtomicU64,
    in_flight: AtomicUsize,
    total_reconnects: AtomicU64,
    total_errors: AtomicU64,
    exhausted: AtomicU64,
    closed: AtomicBool,
}

impl core::fmt::Debug for SecureChannelPool {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SecureChannelPool")
            .field("endpoint", &self.endpoint)
            .field("max_connections", &self.config.max_connections)
            .field("health_score", &self.health_score())
            .finish_non_exhaustive()
    }
}

impl SecureChannelPool {
    /// Pool over TCP with default tuning. `max_connections == 0` is
    /// `InvalidSize`.
    pub fn new(max_connections: usize, endpoint: &str) -> Result<Self> {
        Self::with_config(
            endpoint,
            PoolConfig::builder()
                .max_connections(max_connections)
                .build(),
        )
    }

    /// Pool over TCP with explicit tuning.
    pub fn with_config(endpoint: &str, config: PoolConfig) -> Result<Self> {
        let connector = Arc::new(TcpConnector::new(config.max_response_size));

        Self::with_connector(endpoint, config, connector)
    }

    /// Pool over a caller-supplied transport.
    pub fn with_connector(
        endpoint: &str,
        config: PoolConfig,
        connector: Arc<dyn Connector>,
    ) -> Result<Self> {
        record(Self::build(endpoint, config, connector))
    }

    fn build(endpoint: &str, config: PoolConfig, connector: Arc<dyn Connector>) -> Result<Self> {
        config.validate()?;

        if endpoint.is_empty() {
            return Err(SecureBufferError::InvalidSize);
        }

        let slots = (0..config.max_connections)
            .map(|_| Slot::default())
            .collect();

        tracing::debug!(
            endpoint,
            max_connections = config.max_connections,
            backend = connector.name(),
            "channel pool created"
        );

        Ok(Self {
            endpoint: endpoint.to_owned(),
            config,
            connector,
            slots,
            health_bits: AtomicU64::new(1.0f64.to_bits()),
            in_flight: AtomicUsize::new(0),
            total_reconnects: AtomicU64::new(0),
            total_errors: AtomicU64::new(0),
            exhausted: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        })
    }

    /// Target endpoint.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Tuning in effect.
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Sends `data` and writes the response into `response`.
    ///
    /// - Every slot busy: `CryptoOperationFailed`, counted as `exhausted`.
    /// - Transport failure or timeout: `CryptoOperationFailed`; the
    ///   connection is dropped and the health score decays.
    /// - Response larger than `response.capacity()`: `BufferOverflow`,
    ///   `response` untouched.
    /// - Pool closed: `NullPointer`.
    pub fn send(&self, data: &[u8], response: &SecureBuffer) -> Result<()> {
        record(self.dispatch(data, response))
    }

    fn dispatch(&self, data: &[u8], response: &SecureBuffer) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SecureBufferError::NullPointer);
        }

        let Some(claim) = self.claim() else {
            self.exhausted.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                endpoint = %self.endpoint,
                max_connections = self.config.max_connections,
                "channel pool exhausted"
            );
            return Err(SecureBufferError::CryptoOperationFailed);
        };

        match self.exchange(&claim, data) {
            Ok(reply) => {
                claim.slot.successes.fetch_add(1, Ordering::Relaxed);
                self.adjust_health(true);

                if reply.len() > response.capacity() {
                    return Err(SecureBufferError::BufferOverflow);
                }

                response.store(&reply)
            }
            Err(_) if self.closed.load(Ordering::Acquire) => Err(SecureBufferError::NullPointer),
            Err(err) => {
                claim.slot.failures.fetch_add(1, Ordering::Relaxed);
                self.total_errors.fetch_add(1, Ordering::Relaxed);
                self.adjust_health(false);

                tracing::warn!(
                    endpoint = %self.endpoint,
                    connection_id = claim.index,
                    error = %err,
                    health_score = self.health_score(),
                    "transport failure"
                );

                Err(SecureBufferError::CryptoOperationFailed)
            }
        }
    }

    /// Claims an idle connected slot, else any free slot.
    pub(crate) fn claim(&self) -> Option<Claim<'_>> {
        let connected_first = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.connected.load(Ordering::Acquire))
            .chain(
                self.slots
                    .iter()
                    .enumerate()
                    .filter(|(_, slot)| !slot.connected.load(Ordering::Acquire)),
            );

        for (index, slot) in connected_first {
            if slot.try_claim() {
                self.in_flight.fetch_add(1, Ordering::AcqRel);

                return Some(Claim {
                    index,
                    slot,
                    in_flight: &self.in_flight,
                });
            }
        }

        None
    }

    pub(crate) fn exchange(
        &self,
        claim: &Claim<'_>,
        data: &[u8],
    ) -> io::Result<Zeroizing<Vec<u8>>> {
        let slot = claim.slot;
        let mut channel = slot.channel.lock();

        // close() may have emptied this slot after it was claimed.
        if self.closed.load(Ordering::Acquire) {
            return Err(io::Error::from(io::ErrorKind::NotConnected));
        }

        if channel.is_none() {
            *channel = Some(self.connect(claim)?);
        }

        let outcome = match channel.as_mut() {
            Some(open) => open.round_trip(data, self.config.io_timeout()),
            None => Err(io::Error::from(io::ErrorKind::NotConnected)),
        };

        slot.touch();

        if outcome.is_err() {
            slot.disconnect(&mut channel);
        }

        outcome
    }

    fn connect(&self, claim: &Claim<'_>) -> io::Result<Box<dyn Channel>> {
        let slot = claim.slot;
        let channel = self
            .connector
            .connect(&self.endpoint, self.config.connect_timeout())?;

        if slot.connects.fetch_add(1, Ordering::Relaxed) > 0 {
            self.total_reconnects.fetch_add(1, Ordering::Relaxed);
        }
        slot.connected.store(true, Ordering::Release);

        tracing::debug!(
            endpoint = %self.endpoint,
            connection_id = claim.index,
            "connection established"
        );

        Ok(channel)
    }

    fn adjust_health(&self, success: bool) {
        let decay = self.config.failure_decay;
        let recovery = self.config.recovery_rate;

        let _ = self
            .health_bits
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
                let score = f64::from_bits(bits);
                let next = if success {
                    score + (1.0 - score) * recovery
                } else {
                    score * decay
                };

                Some(next.clamp(0.0, 1.0).to_bits())
            });
    }

    /// Raw score in [0.0, 1.0].
    pub fn health_score(&self) -> f64 {
        f64::from_bits(self.health_bits.load(Ordering::Acquire))
    }

    /// Open and at or above the healthy threshold.
    pub fn is_healthy(&self) -> bool {
        !self.closed.load(Ordering::Acquire) && self.health_score() >= self.config.healthy_threshold
    }

    /// Slots currently holding a live channel.
    pub fn active_connections(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.connected.load(Ordering::Acquire))
            .count()
    }

    /// Sends currently running.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Closes every connection. Later sends fail with `NullPointer`.
    ///
    /// Waits for sends already holding a connection to finish with it.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        for slot in self.slots.iter() {
            let mut channel = slot.channel.lock();
            slot.disconnect(&mut channel);
        }

        tracing::debug!(endpoint = %self.endpoint, "channel pool closed");
    }

    /// Whether [`SecureChannelPool::close`] ran.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Snapshot of the pool.
    pub fn status(&self) -> PoolStatus {
        let connections = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.connects.load(Ordering::Relaxed) > 0)
            .map(|(connection_id, slot)| ConnectionStatus {
                connection_id,
                connected: slot.connected.load(Ordering::Acquire),
                last_activity_ms: slot.last_activity_ms.load(Ordering::Relaxed),
                reconnects: slot.connects.load(Ordering::Relaxed).saturating_sub(1),
                errors: slot.failures.load(Ordering::Relaxed),
                successes: slot.successes.load(Ordering::Relaxed),
            })
            .collect();

        PoolStatus {
            backend: self.connector.name().to_owned(),
            endpoint: self.endpoint.clone(),
            max_connections: self.config.max_connections,
            active_connections: self.active_connections(),
            in_flight: self.in_flight(),
            health_score: self.health_score(),
            healthy: self.is_healthy(),
            total_reconnects: self.total_reconnects.load(Ordering::Relaxed),
            total_errors: self.total_errors.load(Ordering::Relaxed),
            exhausted: self.exhausted.load(Ordering::Relaxed),
            closed: self.is_closed(),
            connections,
        }
    }

    /// [`SecureChannelPool::status`] as JSON.
    pub fn status_json(&self) -> String {
        self.status().to_json()
    }
}

impl Drop for SecureChannelPool {
    fn drop(&mut self) {
        self.close();
    }
}

/// Per-connection view in [`PoolStatus`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    /// Slot index.
    pub connection_id: usize,
    /// Holds a live channel.
    pub connected: bool,
    /// Unix time of the last request, in milliseconds.
    pub last_activity_ms: u64,
    /// Connections opened after the first one.
    pub reconnects: u64,
    /// Transport failures.
    pub errors: u64,
    /// Completed round trips.
    pub successes: u64,
}

/// Point-in-time pool snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolStatus {
    /// Transport name.
    pub backend: String,
    /// Target endpoint.
    pub endpoint: String,
    /// Configured bound.
    pub max_connections: usize,
    /// Live channels.
    pub active_connections: usize,
    /// Sends running.
    pub in_flight: usize,
    /// Health score.
    pub health_score: f64,
    /// `is_healthy()`.
    pub healthy: bool,
    /// Connections re-opened after a failure.
    pub total_reconnects: u64,
    /// Transport failures.
    pub total_errors: u64,
    /// Sends rejected because every slot was busy.
    pub exhausted: u64,
    /// `close()` ran.
    pub closed: bool,
    /// Slots that connected at least once.
    pub connections: Vec<ConnectionStatus>,
}

impl PoolStatus {
    /// JSON object.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| String::from("{}"))
    }
}
