// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printer readiness probe.

use std::sync::Arc;

use tracing::{debug, info};

use etikett_core::error::Result;
use etikett_core::types::{PrinterState, TransportType};

use crate::connection::{ConnectionHandle, ConnectionManager};

/// Reads a printer's state through the connection manager.
///
/// The probe opens a connection when needed but never closes it; the
/// connection stays with the manager for the print that follows.
#[derive(Clone)]
pub struct StatusProbe {
    connections: Arc<ConnectionManager>,
}

impl StatusProbe {
    pub fn new(connections: Arc<ConnectionManager>) -> Self {
        Self { connections }
    }

    /// Fetch a connection for `address` and read the printer's state.
    pub async fn probe(
        &self,
        address: &str,
        transport: Option<TransportType>,
        force_reconnection: bool,
    ) -> Result<PrinterState> {
        let handle = self
            .connections
            .get_connection(address, transport, force_reconnection)
            .await?;
        let state = read_state(&handle).await?;
        info!(%address, %state, ready = state.is_ready_to_print(), "printer status");
        Ok(state)
    }
}

/// Open `handle` if necessary and query the printer's current state.
pub async fn read_state(handle: &ConnectionHandle) -> Result<PrinterState> {
    let mut connection = handle.lock().await;
    if !connection.is_open() {
        debug!(address = %handle.address(), "opening connection for status");
        connection.open().await?;
    }
    connection.query_status().await
}
