// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

//! Per-buffer reader/writer lock state.
//!
//! Acquisition never waits: an incompatible request fails immediately with
//! `ThreadSafetyViolation`. Holders are identified by a per-thread token.

use core::sync::atomic::{AtomicU64, Ordering};

use crate::error::{Result, SecureBufferError};

/// Identity of a calling thread.
pub(crate) type Holder = u64;

static NEXT_HOLDER: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static HOLDER: Holder = NEXT_HOLDER.fetch_add(1, Ordering::Relaxed);
}

/// Token of the calling thread. Stable for the thread's lifetime, never reused.
pub(crate) fn current_holder() -> Holder {
    HOLDER.with(|holder| *holder)
}

/// Observable lock state of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    /// No lock held.
    Unlocked,
    /// Held by `n` readers.
    ReadLocked(usize),
    /// Held exclusively by one writer.
    WriteLocked,
}

#[derive(Debug, Default)]
pub(crate) struct AccessControl {
    writer: Option<Holder>,
    readers: Vec<Holder>,
}

impl AccessControl {
    pub(crate) fn state(&self) -> LockState {
        match (self.writer, self.readers.len()) {
            (Some(_), _) => LockState::WriteLocked,
            (None, 0) => LockState::Unlocked,
            (None, n) => LockState::ReadLocked(n),
        }
    }

    pub(crate) fn acquire_read(&mut self, holder: Holder) -> Result<()> {
        if self.writer.is_some() {
            return Err(SecureBufferError::ThreadSafetyViolation);
        }

        self.readers.push(holder);

        Ok(())
    }

    pub(crate) fn acquire_write(&mut self, holder: Holder) -> Result<()> {
        if self.writer.is_some() || !self.readers.is_empty() {
            return Err(SecureBufferError::ThreadSafetyViolation);
        }

        self.writer = Some(holder);

        Ok(())
    }

    /// Releases one lock held by `holder`, the write lock first.
    pub(crate) fn release(&mut self, holder: Holder) -> Result<()> {
        if self.writer == Some(holder) {
            self.writer = None;
            return Ok(());
        }

        let position = self
            .readers
            .iter()
            .position(|&reader| reader == holder)
            .ok_or(SecureBufferError::ThreadSafetyViolation)?;
        self.readers.swap_remove(position);

        Ok(())
    }

    /// Contents may be read: no other thread is writing.
    pub(crate) fn permits_read(&self, holder: Holder) -> bool {
        self.writer.is_none_or(|writer| writer == holder)
    }

    /// Contents may be replaced: `holder` writes, or nobody holds anything.
    pub(crate) fn permits_write(&self, holder: Holder) -> bool {
        match self.writer {
            Some(writer) => writer == holder,
            None => self.readers.is_empty(),
        }
    }

    /// Only `holder` holds locks, if any are held at all.
    pub(crate) fn permits_exclusive(&self, holder: Holder) -> bool {
        self.permits_read(holder) && self.readers.iter().all(|&reader| reader == holder)
    }

    pub(crate) fn is_writer(&self, holder: Holder) -> bool {
        self.writer == Some(holder)
    }

    pub(crate) fn clear(&mut self) {
        self.writer = None;
        self.readers.clear();
    }
}
