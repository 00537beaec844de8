// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

//! Handle arenas.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock};

use parking_lot::RwLock;
use securebuffer::{SecureBuffer, SecureBufferError, SecureChannelPool};

/// Opaque buffer handle. `0` is the null handle.
pub type SecureBufferHandle = u64;

/// Opaque pool handle. `0` is the null handle.
pub type SecureChannelPoolHandle = u64;

pub(crate) static BUFFERS: LazyLock<HandleTable<SecureBuffer>> = LazyLock::new(HandleTable::new);

pub(crate) static POOLS: LazyLock<HandleTable<SecureChannelPool>> =
    LazyLock::new(HandleTable::new);

/// Objects addressed by monotonically increasing ids.
pub(crate) struct HandleTable<T> {
    next: AtomicU64,
    entries: RwLock<HashMap<u64, Arc<T>>>,
}

impl<T> HandleTable<T> {
    pub(crate) fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub(crate) fn insert(&self, value: T) -> u64 {
        let id = self.next.fetch_add(1, Ordering::Relaxed);
        self.entries.write().insert(id, Arc::new(value));

        id
    }

    /// Shared reference to the object behind `id`.
    ///
    /// The returned `Arc` keeps the object alive even if another thread
    /// removes the handle meanwhile.
    pub(crate) fn get(&self, id: u64) -> Result<Arc<T>, SecureBufferError> {
        self.entries
            .read()
            .get(&id)
            .cloned()
            .ok_or(SecureBufferError::NullPointer)
    }

    pub(crate) fn remove(&self, id: u64) -> Option<Arc<T>> {
        self.entries.write().remove(&id)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.read().len()
    }
}

