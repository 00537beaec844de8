// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

//! securebuffer_guard - One-time process hardening
//!
//! Disables core dumps and ptrace attachment for the whole process:
//! - `prctl(PR_SET_DUMPABLE, 0)`
//! - `setrlimit(RLIMIT_CORE, 0)`
//!
//! The syscalls run at most once per process, on the first call to
//! [`engage`]. Later calls return the cached outcome. [`status`] never has
//! side effects.
//!
//! Without the `guard` feature (off by default) nothing is attempted and every
//! protection is reported as inactive.

#![warn(missing_docs)]

#[cfg(test)]
mod tests;

use std::sync::OnceLock;

/// Outcome of the process-level protections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardStatus {
    /// `prctl(PR_SET_DUMPABLE, 0)` succeeded.
    ///
    /// Blocks ptrace attachment by non-root peers and suppresses core dumps.
    /// Other code can revert it.
    pub not_dumpable: bool,

    /// `setrlimit(RLIMIT_CORE, 0)` succeeded.
    ///
    /// Core dumps are limited to 0 bytes. Does NOT block ptrace.
    pub core_limit_zero: bool,
}

impl GuardStatus {
    /// At least one protection is active.
    pub fn is_protected(&self) -> bool {
        self.not_dumpable || self.core_limit_zero
    }

    /// Short label for diagnostics: `"full"`, `"partial"` or `"none"`.
    pub fn label(&self) -> &'static str {
        match (self.not_dumpable, self.core_limit_zero) {
            (true, true) => "full",
            (false, false) => "none",
            _ => "partial",
        }
    }
}

static STATUS: OnceLock<GuardStatus> = OnceLock::new();

/// Applies the process protections once and returns their outcome.
///
/// Thread-safe: concurrent first callers block until the single initializer
/// finishes, then all observe the same status.
///
/// # Example
///
/// ```
/// let status = securebuffer_guard::engage();
/// assert_eq!(securebuffer_guard::status(), Some(status));
/// ```
pub fn engage() -> GuardStatus {
    *STATUS.get_or_init(|| {
        let status = apply();

        if status.is_protected() {
            tracing::debug!(
                not_dumpable = status.not_dumpable,
                core_limit_zero = status.core_limit_zero,
                "process guard engaged"
            );
        } else {
            tracing::warn!("process guard unavailable; core dumps are not suppressed");
        }

        status
    })
}

/// The cached outcome, or `None` if [`engage`] has not run yet.
pub fn status() -> Option<GuardStatus> {
    STATUS.get().copied()
}

/// Whether the crate was built with the `guard` feature.
pub const fn is_compiled_in() -> bool {
    cfg!(feature = "guard")
}

fn apply() -> GuardStatus {
    if !is_compiled_in() {
        return GuardStatus {
            not_dumpable: false,
            core_limit_zero: false,
        };
    }

    GuardStatus {
        not_dumpable: set_not_dumpable(),
        core_limit_zero: set_core_limit_zero(),
    }
}

#[cfg(target_os = "linux")]
fn set_not_dumpable() -> bool {
    unsafe { libc::prctl(libc::PR_SET_DUMPABLE, 0, 0, 0, 0) == 0 }
}

#[cfg(not(target_os = "linux"))]
fn set_not_dumpable() -> bool {
    false
}

#[cfg(target_os = "linux")]
fn set_core_limit_zero() -> bool {
    let limit = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    unsafe { libc::setrlimit(libc::RLIMIT_CORE, &limit) == 0 }
}

#[cfg(not(target_os = "linux"))]
fn set_core_limit_zero() -> bool {
    false
}
