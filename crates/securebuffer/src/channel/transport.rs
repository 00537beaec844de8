// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

//! Transport seam of the pool.
//!
//! The pool does not implement a secure protocol. A [`Connector`] hands it
//! already-secured [`Channel`]s; [`TcpConnector`] is the default and frames
//! each message with a big-endian `u32` length prefix.

use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use zeroize::Zeroizing;

/// One established connection.
pub trait Channel: Send + core::fmt::Debug {
    /// Sends `request` and waits for one response within `timeout`.
    fn round_trip(&mut self, request: &[u8], timeout: Duration) -> io::Result<Zeroizing<Vec<u8>>>;
}

/// Opens channels to an endpoint.
pub trait Connector: Send + Sync + core::fmt::Debug {
    /// Establishes a new channel to `endpoint` within `timeout`.
    fn connect(&self, endpoint: &str, timeout: Duration) -> io::Result<Box<dyn Channel>>;

    /// Backend name reported in pool status.
    fn name(&self) -> &'static str {
        "custom"
    }
}

/// Length-prefixed frames over TCP.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    max_frame: usize,
}

impl TcpConnector {
    /// Connector rejecting response frames larger than `max_frame`.
    pub fn new(max_frame: usize) -> Self {
        Self { max_frame }
    }
}

impl Connector for TcpConnector {
    fn connect(&self, endpoint: &str, timeout: Duration) -> io::Result<Box<dyn Channel>> {
        let mut last_err =
            io::Error::new(io::ErrorKind::InvalidInput, "endpoint resolved to no address");

        for addr in endpoint.to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => {
                    stream.set_nodelay(true)?;

                    return Ok(Box::new(TcpChannel {
                        stream,
                        max_frame: self.max_frame,
                    }));
                }
                Err(err) => last_err = err,
            }
        }

        Err(last_err)
    }

    fn name(&self) -> &'static str {
        "tcp"
    }
}

#[derive(Debug)]
struct TcpChannel {
    stream: TcpStream,
    max_frame: usize,
}

impl Channel for TcpChannel {
    fn round_trip(&mut self, request: &[u8], timeout: Duration) -> io::Result<Zeroizing<Vec<u8>>> {
        self.stream.set_read_timeout(Some(timeout))?;
        self.stream.set_write_timeout(Some(timeout))?;

        write_frame(&mut self.stream, request)?;
        read_frame(&mut self.stream, self.max_frame)
    }
}

/// Writes `payload` prefixed with its big-endian `u32` length.
pub fn write_frame(writer: &mut impl Write, payload: &[u8]) -> io::Result<()> {
    let len = u32::try_from(payload.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "frame too large"))?;

    writer.write_all(&len.to_be_bytes())?;
    writer.write_all(payload)?;
    writer.flush()
}

/// Reads one frame written by [`write_frame`], refusing frames over `max_frame`.
pub fn read_frame(reader: &mut impl Read, max_frame: usize) -> io::Result<Zeroizing<Vec<u8>>> {
    let mut header = [0u8; 4];
    reader.read_exact(&mut header)?;

    let len = u32::from_be_bytes(header) as usize;
    if len > max_frame {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "response frame too large"));
    }

    let mut payload = Zeroizing::new(vec![0u8; len]);
    reader.read_exact(&mut payload)?;

    Ok(payload)
}
