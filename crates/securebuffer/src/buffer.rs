// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

//! SecureBuffer - a fixed-capacity protected region holding one secret.
//!
//! # Lifecycle
//!
//! - Creation reserves and zeroes `capacity` bytes, then applies the level's
//!   locking and dump-exclusion rules.
//! - Mutations (`copy`, `with_data_mut`, `zero_memory`, key derivation,
//!   decryption into the buffer) recompute the BLAKE3 checksum over
//!   `data[..len]`.
//! - `free` (or drop) wipes the full capacity, unlocks, clears lock state and
//!   updates metrics before the region is released. Every later call fails
//!   with `NullPointer`.
//!
//! # Concurrency
//!
//! Methods take `&self`; share a buffer across threads with `Arc`. The
//! reader/writer discipline is a try-lock: see [`SecureBuffer::acquire_read_lock`].
//! Buffers built with `thread_safe(false)` only accept calls from the
//! creating thread.

use core::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use securebuffer_region::{Fallback, Region};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, Zeroizing};

use crate::access::{AccessControl, Holder, LockState, current_holder};
use crate::audit::AuditEvent;
use crate::context::Context;
use crate::error::{Result, SecureBufferError, record};
use crate::level::{LevelPolicy, LockRequirement, SecurityLevel};

/// Largest capacity any buffer may have (1 GiB).
pub const MAX_BUFFER_SIZE: usize = 1 << 30;

static NEXT_BUFFER_ID: AtomicU64 = AtomicU64::new(1);

type Checksum = [u8; 32];

fn checksum(bytes: &[u8]) -> Checksum {
    *blake3::hash(bytes).as_bytes()
}

struct Inner {
    region: Option<Box<dyn Region>>,
    len: usize,
    /// `None` while raw mutable access is outstanding.
    checksum: Option<Checksum>,
    access: AccessControl,
}

/// Builder for [`SecureBuffer`].
#[derive(Debug)]
pub struct SecureBufferBuilder {
    size: usize,
    level: SecurityLevel,
    thread_safe: bool,
    context: Option<Arc<Context>>,
}

impl SecureBufferBuilder {
    /// Requested level (may be raised by the enterprise policy).
    pub fn security_level(mut self, level: SecurityLevel) -> Self {
        self.level = level;
        self
    }

    /// Whether the buffer accepts lock acquisition and cross-thread calls.
    /// Defaults to `true`.
    pub fn thread_safe(mut self, thread_safe: bool) -> Self {
        self.thread_safe = thread_safe;
        self
    }

    /// Context receiving metrics and audit records. Defaults to the global one.
    pub fn context(mut self, context: Arc<Context>) -> Self {
        self.context = Some(context);
        self
    }

    /// Allocates the buffer.
    pub fn build(self) -> Result<SecureBuffer> {
        let context = self
            .context
            .unwrap_or_else(|| Arc::clone(Context::global()));

        let observer = Arc::clone(&context);
        record(observer.metrics().timed(|| {
            SecureBuffer::allocate(self.size, self.level, self.thread_safe, context)
        }))
    }
}

/// Protected, integrity-checked secret storage.
///
/// # Example
///
/// ```
/// use securebuffer::{SecureBuffer, SecurityLevel};
///
/// let buffer = SecureBuffer::create(64, SecurityLevel::Standard).expect("create");
/// buffer.copy(b"sk_live_abcd").expect("copy");
/// assert_eq!(buffer.len(), 12);
///
/// buffer.free().expect("free");
/// assert!(buffer.copy(b"x").is_err());
/// ```
pub struct SecureBuffer {
    id: u64,
    capacity: usize,
    level: SecurityLevel,
    thread_safe: bool,
    owner: Holder,
    context: Arc<Context>,
    inner: RwLock<Inner>,
}

impl core::fmt::Debug for SecureBuffer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SecureBuffer")
            .field("id", &self.id)
            .field("capacity", &self.capacity)
            .field("level", &self.level)
            .field("thread_safe", &self.thread_safe)
            .finish_non_exhaustive()
    }
}

impl SecureBuffer {
    /// Starts a builder for a buffer of `size` bytes.
    pub fn builder(size: usize) -> SecureBufferBuilder {
        SecureBufferBuilder {
            size,
            level: SecurityLevel::Standard,
            thread_safe: true,
            context: None,
        }
    }

    /// Thread-safe buffer of `size` bytes at `level`, on the global context.
    pub fn create(size: usize, level: SecurityLevel) -> Result<Self> {
        Self::builder(size).security_level(level).build()
    }

    /// Thread-safe `Standard` buffer on the global context.
    pub fn new(size: usize) -> Result<Self> {
        Self::create(size, SecurityLevel::Standard)
    }

    fn allocate(
        size: usize,
        requested: SecurityLevel,
        thread_safe: bool,
        context: Arc<Context>,
    ) -> Result<Self> {
        let policy = context.policy();

        if size == 0 || size > policy.max_buffer_size.min(MAX_BUFFER_SIZE) {
            return Err(SecureBufferError::InvalidSize);
        }

        let level = policy.effective_level(requested);
        let rules = level.policy();
        let lock = policy.effective_lock(level);

        if rules.process_guard {
            securebuffer_guard::engage();
        }

        let fallback = match lock {
            LockRequirement::Required => Fallback::Deny,
            _ => Fallback::Allow,
        };

        let mut region = securebuffer_region::allocate(size, fallback).map_err(|err| {
            tracing::warn!(size, error = %err, "protected region unavailable");
            SecureBufferError::from(err)
        })?;

        if rules.exclude_from_dumps {
            if let Err(err) = region.exclude_from_dumps() {
                tracing::debug!(error = %err, "dump exclusion unavailable");
            }
        }

        match lock {
            LockRequirement::None => {}
            LockRequirement::BestEffort => {
                if let Err(err) = region.lock() {
                    tracing::warn!(
                        size,
                        level = level.as_str(),
                        error = %err,
                        "memory lock refused; buffer stays swappable"
                    );
                }
            }
            LockRequirement::Required => {
                region.lock().map_err(|err| {
                    tracing::warn!(
                        size,
                        level = level.as_str(),
                        error = %err,
                        "memory lock required but refused"
                    );
                    SecureBufferError::AllocationFailed
                })?;
            }
        }

        let id = NEXT_BUFFER_ID.fetch_add(1, Ordering::Relaxed);

        context.metrics().on_allocate(size);
        context
            .audit()
            .record(AuditEvent::BufferCreated, Some(id), "create", true);

        tracing::debug!(
            buffer_id = id,
            size,
            level = level.as_str(),
            region = region.kind().as_str(),
            locked = region.is_locked(),
            "buffer created"
        );

        Ok(Self {
            id,
            capacity: size,
            level,
            thread_safe,
            owner: current_holder(),
            context,
            inner: RwLock::new(Inner {
                region: Some(region),
                len: 0,
                checksum: Some(checksum(&[])),
                access: AccessControl::default(),
            }),
        })
    }

    // =========================================================================
    // Pure accessors
    // =========================================================================

    /// Process-unique id used in logs and audit records.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Fixed capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Occupied bytes. `0` after free.
    pub fn len(&self) -> usize {
        self.inner.read().len
    }

    /// `len() == 0`.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Effective level (after policy).
    pub fn security_level(&self) -> SecurityLevel {
        self.level
    }

    /// Declared concurrency capability.
    pub fn is_thread_safe(&self) -> bool {
        self.thread_safe
    }

    /// Whether the region is currently locked in RAM.
    pub fn is_locked(&self) -> bool {
        self.inner
            .read()
            .region
            .as_deref()
            .is_some_and(|region| region.is_locked())
    }

    /// Whether `free` already ran.
    pub fn is_freed(&self) -> bool {
        self.inner.read().region.is_none()
    }

    /// Current reader/writer state.
    pub fn lock_state(&self) -> LockState {
        self.inner.read().access.state()
    }

    /// Context this buffer reports to.
    pub fn context(&self) -> &Arc<Context> {
        &self.context
    }

    fn rules(&self) -> &'static LevelPolicy {
        self.level.policy()
    }

    fn caller(&self) -> Result<Holder> {
        let holder = current_holder();

        if !self.thread_safe && holder != self.owner {
            return Err(SecureBufferError::ThreadSafetyViolation);
        }

        Ok(holder)
    }

    // =========================================================================
    // Contents
    // =========================================================================

    /// Replaces the contents with `data`.
    ///
    /// Bytes of the previous contents beyond `data.len()` are zeroed.
    pub fn copy(&self, data: &[u8]) -> Result<()> {
        self.timed(|| self.store(data))
    }

    /// Calls `f` with `data[..len]`.
    ///
    /// At `High` and above the checksum is verified first. `f` must not call
    /// back into this buffer.
    pub fn with_data<R>(&self, f: impl FnOnce(&[u8]) -> R) -> Result<R> {
        record(self.read("read", f))
    }

    /// Calls `f` with `data[..len]` mutably and re-seals the checksum after.
    ///
    /// After [`SecureBuffer::data_mut_ptr`] the contents are not verified
    /// first: the call takes the raw writes as they are. `f` must not call
    /// back into this buffer.
    pub fn with_data_mut<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> Result<R> {
        self.timed(|| self.modify(f))
    }

    /// Pointer to the first byte, valid for `capacity()` bytes until `free`.
    ///
    /// Dereferencing is the caller's responsibility. Nothing else may write
    /// through the buffer while the pointer is read.
    pub fn data_ptr(&self) -> Result<*const u8> {
        record(self.read("data_readonly", <[u8]>::as_ptr))
    }

    /// Mutable pointer to the first byte, valid for `capacity()` bytes.
    ///
    /// Requires the write lock on thread-safe buffers. The checksum is
    /// invalidated until [`SecureBuffer::refresh_checksum`] or the next
    /// mutating call; until then integrity checks fail.
    pub fn data_mut_ptr(&self) -> Result<*mut u8> {
        record(self.raw_mut())
    }

    /// Re-seals the checksum over the current `data[..len]`.
    pub fn refresh_checksum(&self) -> Result<()> {
        self.timed(|| self.reseal())
    }

    // =========================================================================
    // Memory protection
    // =========================================================================

    /// Locks the region in RAM. Idempotent.
    pub fn lock_memory(&self) -> Result<()> {
        self.timed(|| self.set_memory_lock(true))
    }

    /// Unlocks the region. Idempotent.
    pub fn unlock_memory(&self) -> Result<()> {
        self.timed(|| self.set_memory_lock(false))
    }

    /// Overwrites the full capacity with zeros and resets `len` to 0.
    pub fn zero_memory(&self) -> Result<()> {
        self.timed(|| self.zero())
    }

    /// Recomputes the checksum and compares it with the sealed one.
    ///
    /// A mismatch is reported as `Ok(false)`. At `High` and above callers
    /// should treat it as fatal for this buffer.
    pub fn integrity_check(&self) -> Result<bool> {
        self.timed(|| self.verify())
    }

    // =========================================================================
    // Access control
    // =========================================================================

    /// Takes a shared lock. Fails immediately if a writer holds the buffer.
    pub fn acquire_read_lock(&self) -> Result<()> {
        self.timed(|| self.with_access(|access, holder| access.acquire_read(holder)))
    }

    /// Takes the exclusive lock. Fails immediately if any lock is held.
    pub fn acquire_write_lock(&self) -> Result<()> {
        self.timed(|| self.with_access(|access, holder| access.acquire_write(holder)))
    }

    /// Releases one lock held by the calling thread.
    pub fn release_lock(&self) -> Result<()> {
        self.timed(|| self.with_access(|access, holder| access.release(holder)))
    }

    // =========================================================================
    // Release
    // =========================================================================

    /// Wipes, unlocks and releases the region.
    ///
    /// Fails with `ThreadSafetyViolation` while another thread holds a lock
    /// and with `NullPointer` if already freed.
    pub fn free(&self) -> Result<()> {
        record(self.release())
    }

    // =========================================================================
    // Internals (also used by crypto)
    // =========================================================================

    /// Runs `op` under the operation timer and records its outcome.
    fn timed<T>(&self, op: impl FnOnce() -> Result<T>) -> Result<T> {
        record(self.context.metrics().timed(op))
    }

    pub(crate) fn store(&self, data: &[u8]) -> Result<()> {
        let holder = self.caller()?;
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        let region = inner
            .region
            .as_deref_mut()
            .ok_or(SecureBufferError::NullPointer)?;

        if data.len() > self.capacity {
            return Err(SecureBufferError::BufferOverflow);
        }
        if !inner.access.permits_write(holder) {
            return Err(SecureBufferError::ThreadSafetyViolation);
        }

        let bytes = region.as_mut_slice();
        bytes[..data.len()].copy_from_slice(data);
        if inner.len > data.len() {
            bytes[data.len()..inner.len].zeroize();
        }

        inner.len = data.len();
        inner.checksum = Some(checksum(&bytes[..data.len()]));

        Ok(())
    }

    pub(crate) fn read<R>(&self, op: &'static str, f: impl FnOnce(&[u8]) -> R) -> Result<R> {
        let holder = self.caller()?;
        let inner = self.inner.read();
        let region = inner
            .region
            .as_deref()
            .ok_or(SecureBufferError::NullPointer)?;

        if !inner.access.permits_read(holder) {
            return Err(SecureBufferError::ThreadSafetyViolation);
        }

        let contents = &region.as_slice()[..inner.len];
        if self.rules().verify_before_read && !self.matches(contents, inner.checksum, op) {
            return Err(SecureBufferError::IntegrityCheckFailed);
        }

        Ok(f(contents))
    }

    /// Copies the contents out under the read discipline, so long
    /// computations keyed by them run without holding the buffer.
    pub(crate) fn expose(&self, op: &'static str) -> Result<Zeroizing<Vec<u8>>> {
        self.read(op, |contents| Zeroizing::new(contents.to_vec()))
    }

    fn modify<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> Result<R> {
        let holder = self.caller()?;
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        let region = inner
            .region
            .as_deref_mut()
            .ok_or(SecureBufferError::NullPointer)?;

        if !inner.access.permits_write(holder) {
            return Err(SecureBufferError::ThreadSafetyViolation);
        }

        // A missing checksum means raw access is outstanding; this write
        // acknowledges it.
        let contents = &mut region.as_mut_slice()[..inner.len];
        if self.rules().verify_before_read
            && inner.checksum.is_some()
            && !self.matches(contents, inner.checksum, "write")
        {
            return Err(SecureBufferError::IntegrityCheckFailed);
        }

        let out = f(contents);
        inner.checksum = Some(checksum(contents));

        Ok(out)
    }

    /// Overwrites the full capacity with `data` and marks it all occupied.
    pub(crate) fn fill(&self, data: &[u8]) -> Result<()> {
        let holder = self.caller()?;
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        let region = inner
            .region
            .as_deref_mut()
            .ok_or(SecureBufferError::NullPointer)?;

        if !inner.access.permits_write(holder) {
            return Err(SecureBufferError::ThreadSafetyViolation);
        }

        if data.len() != self.capacity {
            return Err(SecureBufferError::InvalidSize);
        }

        let bytes = region.as_mut_slice();
        bytes[..data.len()].copy_from_slice(data);

        inner.len = self.capacity;
        inner.checksum = Some(checksum(bytes));

        Ok(())
    }

    fn raw_mut(&self) -> Result<*mut u8> {
        let holder = self.caller()?;
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        let region = inner
            .region
            .as_deref_mut()
            .ok_or(SecureBufferError::NullPointer)?;

        let permitted = if self.thread_safe {
            inner.access.is_writer(holder)
        } else {
            inner.access.permits_write(holder)
        };
        if !permitted {
            return Err(SecureBufferError::ThreadSafetyViolation);
        }

        inner.checksum = None;
        tracing::debug!(buffer_id = self.id, "checksum invalidated by raw access");

        Ok(region.as_mut_ptr())
    }

    fn reseal(&self) -> Result<()> {
        let holder = self.caller()?;
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        let region = inner
            .region
            .as_deref()
            .ok_or(SecureBufferError::NullPointer)?;

        if !inner.access.permits_write(holder) {
            return Err(SecureBufferError::ThreadSafetyViolation);
        }

        inner.checksum = Some(checksum(&region.as_slice()[..inner.len]));

        Ok(())
    }

    fn set_memory_lock(&self, lock: bool) -> Result<()> {
        let holder = self.caller()?;
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        let region = inner
            .region
            .as_deref_mut()
            .ok_or(SecureBufferError::NullPointer)?;

        if !inner.access.permits_exclusive(holder) {
            return Err(SecureBufferError::ThreadSafetyViolation);
        }

        let (outcome, event, operation) = if lock {
            (region.lock(), AuditEvent::MemoryLocked, "lock_memory")
        } else {
            (region.unlock(), AuditEvent::MemoryUnlocked, "unlock_memory")
        };

        self.context
            .audit()
            .record(event, Some(self.id), operation, outcome.is_ok());

        outcome.map_err(|err| {
            tracing::warn!(buffer_id = self.id, error = %err, "{operation} failed");
            SecureBufferError::AllocationFailed
        })?;

        tracing::debug!(buffer_id = self.id, locked = lock, "memory lock toggled");

        Ok(())
    }

    fn zero(&self) -> Result<()> {
        let holder = self.caller()?;
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        let region = inner
            .region
            .as_deref_mut()
            .ok_or(SecureBufferError::NullPointer)?;

        if !inner.access.permits_exclusive(holder) {
            return Err(SecureBufferError::ThreadSafetyViolation);
        }

        region.wipe(self.rules().wipe_passes);
        inner.len = 0;
        inner.checksum = Some(checksum(&[]));

        self.context
            .audit()
            .record(AuditEvent::MemoryZeroed, Some(self.id), "zero_memory", true);

        Ok(())
    }

    fn verify(&self) -> Result<bool> {
        let holder = self.caller()?;
        let inner = self.inner.read();
        let region = inner
            .region
            .as_deref()
            .ok_or(SecureBufferError::NullPointer)?;

        if !inner.access.permits_read(holder) {
            return Err(SecureBufferError::ThreadSafetyViolation);
        }

        Ok(self.matches(
            &region.as_slice()[..inner.len],
            inner.checksum,
            "integrity_check",
        ))
    }

    /// Constant-time comparison; updates metrics and audit.
    fn matches(&self, contents: &[u8], expected: Option<Checksum>, op: &str) -> bool {
        let passed =
            expected.is_some_and(|expected| bool::from(checksum(contents).ct_eq(&expected)));

        self.context.metrics().on_integrity_check(passed);

        if !passed {
            tracing::error!(buffer_id = self.id, operation = op, "integrity check failed");
            self.context
                .audit()
                .record(AuditEvent::IntegrityFailure, Some(self.id), op, false);
        }

        passed
    }

    /// Records an integrity failure detected outside the checksum (AEAD tag).
    pub(crate) fn report_integrity_failure(&self, op: &str) {
        self.context.metrics().on_integrity_check(false);
        tracing::error!(buffer_id = self.id, operation = op, "authentication failed");
        self.context
            .audit()
            .record(AuditEvent::IntegrityFailure, Some(self.id), op, false);
    }

    fn with_access(
        &self,
        f: impl FnOnce(&mut AccessControl, Holder) -> Result<()>,
    ) -> Result<()> {
        let holder = self.caller()?;
        let mut inner = self.inner.write();

        if inner.region.is_none() {
            return Err(SecureBufferError::NullPointer);
        }
        if !self.thread_safe {
            return Err(SecureBufferError::ThreadSafetyViolation);
        }

        f(&mut inner.access, holder)
    }

    fn release(&self) -> Result<()> {
        let holder = self.caller()?;
        let region = {
            let mut inner = self.inner.write();

            if inner.region.is_none() {
                return Err(SecureBufferError::NullPointer);
            }
            if !inner.access.permits_exclusive(holder) {
                return Err(SecureBufferError::ThreadSafetyViolation);
            }

            inner.access.clear();
            inner.len = 0;
            inner.checksum = None;
            inner.region.take()
        };

        if let Some(region) = region {
            self.context.metrics().timed(|| self.teardown(region));
        }

        Ok(())
    }

    fn teardown(&self, mut region: Box<dyn Region>) {
        region.wipe(self.rules().wipe_passes);

        if let Err(err) = region.unlock() {
            tracing::warn!(buffer_id = self.id, error = %err, "munlock failed on free");
        }

        self.context.metrics().on_deallocate(self.capacity);
        self.context
            .audit()
            .record(AuditEvent::BufferFreed, Some(self.id), "free", true);

        tracing::debug!(buffer_id = self.id, "buffer freed");

        drop(region);
    }
}

impl Drop for SecureBuffer {
    fn drop(&mut self) {
        if let Some(region) = self.inner.get_mut().region.take() {
            self.teardown(region);
        }
    }
}
