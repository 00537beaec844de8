// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

use std::io::{self, Cursor};
use std::net::TcpListener;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use super::support::{MockConnector, buffer, buffer_with};
use crate::channel::{PoolConfig, SecureChannelPool, read_frame, write_frame};
use crate::error::{SecureBufferError, last_error};

fn mock_pool(max_connections: usize, connector: &MockConnector) -> SecureChannelPool {
    let config = PoolConfig::builder().max_connections(max_connections).build();

    SecureChannelPool::with_connector("mock:1", config, Arc::new(connector.clone()))
        .expect("Failed to with_connector(..)")
}

fn assert_close(actual: f64, expected: f64) {
    assert!((actual - expected).abs() < 1e-9, "{actual} != {expected}");
}

// =============================================================================
// PoolConfig
// =============================================================================

#[test]
fn test_config_defaults_from_empty_json() {
    let config: PoolConfig = serde_json::from_str("{}").expect("Failed to parse config");

    assert_eq!(config, PoolConfig::default());
    assert_eq!(config.max_connections, 4);
    assert_eq!(config.io_timeout(), Duration::from_secs(10));
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_rejects_unknown_fields() {
    assert!(serde_json::from_str::<PoolConfig>(r#"{"retries":3}"#).is_err());
}

#[test]
fn test_config_validate_ranges() {
    let zero = PoolConfig::builder().max_connections(0).build();
    let decay = PoolConfig::builder().failure_decay(1.5).build();
    let timeout = PoolConfig::builder().io_timeout(Duration::ZERO).build();

    assert_eq!(zero.validate(), Err(SecureBufferError::InvalidSize));
    assert_eq!(decay.validate(), Err(SecureBufferError::InvalidSize));
    assert_eq!(timeout.validate(), Err(SecureBufferError::InvalidSize));
}

// =============================================================================
// create
// =============================================================================

#[test]
fn test_pool_rejects_zero_connections() {
    assert_eq!(
        SecureChannelPool::new(0, "127.0.0.1:1").err(),
        Some(SecureBufferError::InvalidSize)
    );
    assert_eq!(last_error(), Some(SecureBufferError::InvalidSize));
}

#[test]
fn test_pool_rejects_empty_endpoint() {
    assert_eq!(
        SecureChannelPool::new(2, "").err(),
        Some(SecureBufferError::InvalidSize)
    );
}

#[test]
fn test_pool_is_lazy() {
    let connector = MockConnector::new();
    let pool = mock_pool(2, &connector);

    assert_eq!(connector.connects(), 0);
    assert_eq!(pool.active_connections(), 0);
    assert!(pool.is_healthy());
    assert_close(pool.health_score(), 1.0);
}

// =============================================================================
// send()
// =============================================================================

#[test]
fn test_send_writes_response() {
    let connector = MockConnector::new();
    let pool = mock_pool(2, &connector);
    let response = buffer(64);

    pool.send(b"ping", &response).expect("Failed to send(..)");

    assert_eq!(response.with_data(<[u8]>::to_vec), Ok(b"ack:ping".to_vec()));
    assert_eq!(pool.active_connections(), 1);
    assert_eq!(pool.in_flight(), 0);
}

#[test]
fn test_send_reuses_connection() {
    let connector = MockConnector::new();
    let pool = mock_pool(4, &connector);
    let response = buffer(64);

    for _ in 0..5 {
        pool.send(b"ping", &response).expect("Failed to send(..)");
    }

    assert_eq!(connector.connects(), 1);
    assert_eq!(pool.status().total_reconnects, 0);
}

#[test]
fn test_send_oversized_reply_leaves_response() {
    let connector = MockConnector::new();
    connector.state.reply_len.store(65, Ordering::SeqCst);
    let pool = mock_pool(1, &connector);
    let response = buffer_with(64, b"previous");

    assert_eq!(
        pool.send(b"ping", &response),
        Err(SecureBufferError::BufferOverflow)
    );
    assert_eq!(response.with_data(<[u8]>::to_vec), Ok(b"previous".to_vec()));
}

#[test]
fn test_send_failure_decays_and_success_recovers() {
    let connector = MockConnector::new();
    let pool = mock_pool(1, &connector);
    let response = buffer(64);

    connector.state.fail_io.store(true, Ordering::SeqCst);
    assert_eq!(
        pool.send(b"ping", &response),
        Err(SecureBufferError::CryptoOperationFailed)
    );
    assert_close(pool.health_score(), 0.5);
    assert!(pool.is_healthy());
    assert_eq!(pool.active_connections(), 0);

    let _ = pool.send(b"ping", &response);
    assert_close(pool.health_score(), 0.25);
    assert!(!pool.is_healthy());

    connector.state.fail_io.store(false, Ordering::SeqCst);
    pool.send(b"ping", &response).expect("Failed to send(..)");
    assert_close(pool.health_score(), 0.4);

    let status = pool.status();
    assert_eq!(status.total_errors, 2);
    assert_eq!(status.total_reconnects, 2);
    assert_eq!(connector.connects(), 3);
}

#[test]
fn test_send_connect_failure() {
    let connector = MockConnector::new();
    connector.state.fail_connect.store(true, Ordering::SeqCst);
    let pool = mock_pool(1, &connector);
    let response = buffer(64);

    assert_eq!(
        pool.send(b"ping", &response),
        Err(SecureBufferError::CryptoOperationFailed)
    );
    assert_eq!(pool.status().total_errors, 1);
    assert!(response.is_empty());
}

#[test]
fn test_send_exhaustion_fails_fast() {
    const THREADS: usize = 3;

    let connector = MockConnector::with_delay(Duration::from_millis(200));
    let pool = Arc::new(mock_pool(2, &connector));
    let start = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let (pool, start) = (pool.clone(), start.clone());
            thread::spawn(move || {
                let response = buffer(64);
                start.wait();
                pool.send(b"ping", &response)
            })
        })
        .collect();

    let outcomes: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().expect("Failed to join"))
        .collect();

    let failures = outcomes.iter().filter(|outcome| outcome.is_err()).count();
    assert!(outcomes.iter().all(|outcome| {
        matches!(outcome, Ok(()) | Err(SecureBufferError::CryptoOperationFailed))
    }));
    assert!(connector.state.peak.load(Ordering::SeqCst) <= 2);
    assert_eq!(pool.status().exhausted, failures as u64);
    assert_eq!(pool.in_flight(), 0);
}

// =============================================================================
// close() / status()
// =============================================================================

#[test]
fn test_close_disconnects_and_rejects() {
    let connector = MockConnector::new();
    let pool = mock_pool(2, &connector);
    let response = buffer(64);
    pool.send(b"ping", &response).expect("Failed to send(..)");

    pool.close();
    pool.close();

    assert!(pool.is_closed());
    assert!(!pool.is_healthy());
    assert_eq!(pool.active_connections(), 0);
    assert_eq!(
        pool.send(b"ping", &response),
        Err(SecureBufferError::NullPointer)
    );
}

#[test]
fn test_close_after_claim_does_not_reconnect() {
    let connector = MockConnector::new();
    let pool = mock_pool(1, &connector);

    let claim = pool.claim().expect("Failed to claim()");
    pool.close();

    let err = pool
        .exchange(&claim, b"ping")
        .expect_err("exchange on a closed pool must fail");
    drop(claim);

    assert_eq!(err.kind(), io::ErrorKind::NotConnected);
    assert_eq!(connector.connects(), 0);
    assert_eq!(pool.active_connections(), 0);
    assert_eq!(pool.status().total_errors, 0);
}

#[test]
fn test_status_json() {
    let connector = MockConnector::new();
    let pool = mock_pool(3, &connector);
    let response = buffer(64);
    pool.send(b"ping", &response).expect("Failed to send(..)");

    let value: serde_json::Value =
        serde_json::from_str(&pool.status_json()).expect("Failed to parse status");

    assert_eq!(value["backend"], "mock");
    assert_eq!(value["endpoint"], "mock:1");
    assert_eq!(value["max_connections"], 3);
    assert_eq!(value["active_connections"], 1);
    assert_eq!(value["healthy"], true);
    assert_eq!(value["connections"][0]["successes"], 1);
    assert_eq!(value["connections"].as_array().map(Vec::len), Some(1));
}

// =============================================================================
// TCP transport
// =============================================================================

#[test]
fn test_frame_roundtrip_and_limit() {
    let mut wire = Vec::new();
    write_frame(&mut wire, b"hello").expect("Failed to write_frame(..)");
    assert_eq!(&wire[..4], &[0, 0, 0, 5]);

    let frame = read_frame(&mut Cursor::new(&wire), 16).expect("Failed to read_frame(..)");
    assert_eq!(frame.as_slice(), b"hello");

    let err = read_frame(&mut Cursor::new(&wire), 4).expect_err("frame over limit");
    assert_eq!(err.kind(), io::ErrorKind::InvalidData);
}

#[test]
fn test_tcp_round_trip() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind");
    let endpoint = listener.local_addr().expect("Failed to local_addr()").to_string();

    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("Failed to accept()");
        while let Ok(request) = read_frame(&mut stream, 1024) {
            let mut reply = b"pong:".to_vec();
            reply.extend_from_slice(&request);
            write_frame(&mut stream, &reply).expect("Failed to write_frame(..)");
        }
    });

    let pool = SecureChannelPool::new(1, &endpoint).expect("Failed to new(..)");
    let response = buffer(64);

    pool.send(b"one", &response).expect("Failed to send(..)");
    assert_eq!(response.with_data(<[u8]>::to_vec), Ok(b"pong:one".to_vec()));

    pool.send(b"two", &response).expect("Failed to send(..)");
    assert_eq!(response.with_data(<[u8]>::to_vec), Ok(b"pong:two".to_vec()));

    assert_eq!(pool.status().backend, "tcp");
    drop(pool);
    server.join().expect("Failed to join server");
}

#[test]
fn test_tcp_connection_refused() {
    let endpoint = {
        let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind");
        listener.local_addr().expect("Failed to local_addr()").to_string()
    };

    let config = PoolConfig::builder()
        .max_connections(1)
        .connect_timeout(Duration::from_millis(500))
        .build();
    let pool =
        SecureChannelPool::with_config(&endpoint, config).expect("Failed to with_config(..)");
    let response = buffer(64);

    assert_eq!(
        pool.send(b"ping", &response),
        Err(SecureBufferError::CryptoOperationFailed)
    );
    assert_close(pool.health_score(), 0.5);
}
