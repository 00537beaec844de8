// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

//! Pooled secured channels to one endpoint.

mod config;
pub(crate) mod pool;
mod transport;

pub use config::{PoolConfig, PoolConfigBuilder};
pub use pool::{ConnectionStatus, PoolStatus, SecureChannelPool};
pub use transport::{Channel, Connector, TcpConnector, read_frame, write_frame};
