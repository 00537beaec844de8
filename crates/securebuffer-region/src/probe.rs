// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

//! Release probe (test utilities only).
//!
//! Lets a test observe a region's bytes right before the region performs its
//! own final wipe and releases the memory. A probe sees exactly what the owner
//! of the region left behind.

use std::sync::Mutex;

type ReleaseProbe = Box<dyn Fn(&[u8]) + Send + Sync + 'static>;

static RELEASE_PROBE: Mutex<Option<ReleaseProbe>> = Mutex::new(None);

/// Installs `probe`, replacing any previous one.
pub fn set_release_probe<F>(probe: F)
where
    F: Fn(&[u8]) + Send + Sync + 'static,
{
    if let Ok(mut slot) = RELEASE_PROBE.lock() {
        *slot = Some(Box::new(probe));
    }
}

/// Removes the installed probe.
pub fn clear_release_probe() {
    if let Ok(mut slot) = RELEASE_PROBE.lock() {
        *slot = None;
    }
}

pub(crate) fn on_release(bytes: &[u8]) {
    if let Ok(slot) = RELEASE_PROBE.lock() {
        if let Some(probe) = slot.as_ref() {
            probe(bytes);
        }
    }
}
