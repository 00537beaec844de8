// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

//! Shared fixtures: isolated contexts and an in-memory transport.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use zeroize::Zeroizing;

use crate::buffer::SecureBuffer;
use crate::channel::{Channel, Connector};
use crate::context::Context;
use crate::level::SecurityLevel;

pub(crate) fn buffer_in(context: &Arc<Context>, size: usize, level: SecurityLevel) -> SecureBuffer {
    SecureBuffer::builder(size)
        .security_level(level)
        .context(Arc::clone(context))
        .build()
        .expect("Failed to build()")
}

/// Standard buffer on a fresh context.
pub(crate) fn buffer(size: usize) -> SecureBuffer {
    buffer_in(&Context::new(), size, SecurityLevel::Standard)
}

/// Standard buffer on a fresh context, filled with `data`.
pub(crate) fn buffer_with(size: usize, data: &[u8]) -> SecureBuffer {
    let buffer = buffer(size);
    buffer.copy(data).expect("Failed to copy(..)");
    buffer
}

/// Full capacity as seen through the raw read pointer.
pub(crate) fn dump(buffer: &SecureBuffer) -> Vec<u8> {
    let ptr = buffer.data_ptr().expect("Failed to data_ptr()");
    unsafe { core::slice::from_raw_parts(ptr, buffer.capacity()) }.to_vec()
}

#[derive(Debug, Default)]
pub(crate) struct MockState {
    pub fail_connect: AtomicBool,
    pub fail_io: AtomicBool,
    pub connects: AtomicUsize,
    pub active: AtomicUsize,
    pub peak: AtomicUsize,
    pub reply_len: AtomicUsize,
    pub delay_ms: AtomicUsize,
}

/// In-memory connector. Channels echo the request prefixed with `ack:`, or
/// reply with `reply_len` bytes of `0xAB` when it is non-zero.
#[derive(Debug, Default, Clone)]
pub(crate) struct MockConnector {
    pub state: Arc<MockState>,
}

impl MockConnector {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_delay(delay: Duration) -> Self {
        let connector = Self::default();
        connector
            .state
            .delay_ms
            .store(delay.as_millis() as usize, Ordering::SeqCst);
        connector
    }

    pub(crate) fn connects(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }
}

impl Connector for MockConnector {
    fn connect(&self, _endpoint: &str, _timeout: Duration) -> io::Result<Box<dyn Channel>> {
        if self.state.fail_connect.load(Ordering::SeqCst) {
            return Err(io::Error::from(io::ErrorKind::ConnectionRefused));
        }

        self.state.connects.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(MockChannel {
            state: Arc::clone(&self.state),
        }))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[derive(Debug)]
struct MockChannel {
    state: Arc<MockState>,
}

impl Channel for MockChannel {
    fn round_trip(&mut self, request: &[u8], _timeout: Duration) -> io::Result<Zeroizing<Vec<u8>>> {
        let active = self.state.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.peak.fetch_max(active, Ordering::SeqCst);

        let delay = self.state.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            std::thread::sleep(Duration::from_millis(delay as u64));
        }

        self.state.active.fetch_sub(1, Ordering::SeqCst);

        if self.state.fail_io.load(Ordering::SeqCst) {
            return Err(io::Error::from(io::ErrorKind::TimedOut));
        }

        let reply_len = self.state.reply_len.load(Ordering::SeqCst);
        if reply_len > 0 {
            return Ok(Zeroizing::new(vec![0xAB; reply_len]));
        }

        let mut reply = b"ack:".to_vec();
        reply.extend_from_slice(request);

        Ok(Zeroizing::new(reply))
    }
}
