// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raw TCP printer connection (port 9100).
//
// Label data is written to the socket as-is. Readiness is read with the
// `~HS` host-status query, whose reply is three STX/ETX-framed lines of
// comma-separated flags.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use etikett_bridge::traits::PrinterConnection;
use etikett_core::error::{EtikettError, Result};
use etikett_core::types::PrinterState;

/// Default raw TCP port.
pub const RAW_PORT: u16 = 9100;

const CHUNK_SIZE: usize = 8192;

const HOST_STATUS_QUERY: &[u8] = b"~HS\r\n";

const STX: u8 = 0x02;
const ETX: u8 = 0x03;

/// A host-status reply never legitimately exceeds this.
const MAX_STATUS_REPLY: usize = 1024;

/// `PrinterConnection` over a raw TCP socket.
pub struct TcpConnection {
    address: String,
    port: u16,
    timeout: Duration,
    stream: Option<TcpStream>,
}

impl TcpConnection {
    pub fn new(address: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            address: address.into(),
            port,
            timeout,
            stream: None,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }

    fn stream_mut(&mut self) -> Result<&mut TcpStream> {
        self.stream
            .as_mut()
            .ok_or_else(|| EtikettError::Connection("connection is not open".into()))
    }

    async fn send_chunks(&mut self, data: &[u8]) -> Result<()> {
        let total = data.len();
        let stream = self.stream_mut()?;
        let mut sent = 0;
        for chunk in data.chunks(CHUNK_SIZE) {
            stream
                .write_all(chunk)
                .await
                .map_err(|e| EtikettError::Connection(format!("send failed at byte {sent}: {e}")))?;
            sent += chunk.len();
            debug!(sent, total, "raw TCP progress");
        }
        stream
            .flush()
            .await
            .map_err(|e| EtikettError::Connection(format!("flush: {e}")))
    }

    async fn exchange_status(&mut self) -> Result<Vec<u8>> {
        let timeout = self.timeout;
        let stream = self.stream_mut()?;
        stream
            .write_all(HOST_STATUS_QUERY)
            .await
            .map_err(|e| EtikettError::Connection(format!("status query: {e}")))?;

        tokio::time::timeout(timeout, read_status_reply(stream))
            .await
            .map_err(|_| {
                EtikettError::Connection(format!("no status reply after {}s", timeout.as_secs()))
            })?
    }
}

async fn read_status_reply(stream: &mut TcpStream) -> Result<Vec<u8>> {
    let mut reply = Vec::with_capacity(128);
    let mut buf = [0u8; 256];
    while reply.iter().filter(|&&b| b == ETX).count() < 3 {
        let n = stream
            .read(&mut buf)
            .await
            .map_err(|e| EtikettError::Connection(format!("status read: {e}")))?;
        if n == 0 {
            return Err(EtikettError::Connection("printer closed the connection".into()));
        }
        reply.extend_from_slice(&buf[..n]);
        if reply.len() > MAX_STATUS_REPLY {
            return Err(EtikettError::StatusUnreadable("status reply too long".into()));
        }
    }
    Ok(reply)
}

#[async_trait]
impl PrinterConnection for TcpConnection {
    async fn open(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }
        let addr = self.endpoint();
        info!(addr = %addr, "connecting via raw TCP");

        let stream = tokio::time::timeout(self.timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| {
                EtikettError::Connection(format!(
                    "connection to {addr} timed out after {}s",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| EtikettError::Connection(format!("connect to {addr}: {e}")))?;

        self.stream = Some(stream);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            debug!(addr = %self.endpoint(), "closing raw TCP connection");
            stream
                .shutdown()
                .await
                .map_err(|e| EtikettError::Connection(format!("shutdown: {e}")))?;
        }
        Ok(())
    }

    async fn write(&mut self, data: &[u8]) -> Result<()> {
        let result = self.send_chunks(data).await;
        match &result {
            Ok(()) => info!(total = data.len(), addr = %self.endpoint(), "raw TCP data sent"),
            Err(e) => {
                warn!(error = %e, "raw TCP send failed, dropping socket");
                self.stream = None;
            }
        }
        result
    }

    async fn query_status(&mut self) -> Result<PrinterState> {
        let reply = match self.exchange_status().await {
            Ok(reply) => reply,
            Err(e) => {
                self.stream = None;
                return Err(e);
            }
        };
        parse_host_status(&reply)
    }
}

/// Parse a `~HS` reply.
///
/// Line 1: `aaa,b,c,dddd,eee,f,g,h,iii,j,k,l` where b = paper out,
/// c = paused, f = buffer full, h = partial format, k = under temperature,
/// l = over temperature. Line 2: `mmm,n,o,p,...` where o = head open,
/// p = ribbon out. Line 3 is not needed.
pub fn parse_host_status(reply: &[u8]) -> Result<PrinterState> {
    let frames = status_frames(reply);
    let [first, second, ..] = frames.as_slice() else {
        return Err(EtikettError::StatusUnreadable(format!(
            "expected 3 status lines, got {}",
            frames.len()
        )));
    };

    let line1: Vec<&str> = first.split(',').map(str::trim).collect();
    let line2: Vec<&str> = second.split(',').map(str::trim).collect();
    if line1.len() < 12 || line2.len() < 4 {
        return Err(EtikettError::StatusUnreadable(format!(
            "short status lines ({} and {} fields)",
            line1.len(),
            line2.len()
        )));
    }

    Ok(PrinterState {
        paper_out: flag(line1[1])?,
        paused: flag(line1[2])?,
        receive_buffer_full: flag(line1[5])?,
        partial_format_in_progress: flag(line1[7])?,
        head_cold: flag(line1[10])?,
        head_too_hot: flag(line1[11])?,
        head_open: flag(line2[2])?,
        ribbon_out: flag(line2[3])?,
    })
}

fn status_frames(reply: &[u8]) -> Vec<String> {
    let mut frames = Vec::new();
    let mut current: Option<Vec<u8>> = None;
    for &byte in reply {
        match byte {
            STX => current = Some(Vec::new()),
            ETX => {
                if let Some(frame) = current.take() {
                    frames.push(String::from_utf8_lossy(&frame).into_owned());
                }
            }
            _ => {
                if let Some(frame) = current.as_mut() {
                    frame.push(byte);
                }
            }
        }
    }
    frames
}

fn flag(field: &str) -> Result<bool> {
    match field {
        "0" => Ok(false),
        "1" => Ok(true),
        other => Err(EtikettError::StatusUnreadable(format!("bad status flag {other:?}"))),
    }
}
