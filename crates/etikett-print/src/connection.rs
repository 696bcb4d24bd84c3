// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Connection lifecycle: at most one printer connection per manager.
//
// A request for the address (and connection kind) of the live connection
// reuses it while it is open. Anything else closes the live connection and
// creates a new one. Close failures are logged and swallowed since the
// replacement matters more than the old link.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use etikett_bridge::traits::{PrinterConnection, RadioConnector};
use etikett_core::config::EngineConfig;
use etikett_core::error::Result;
use etikett_core::types::{ConnectionId, ConnectionKind, TransportType};

use crate::tcp_client::TcpConnection;

/// Creates unopened connections of a given kind.
pub trait ConnectionFactory: Send + Sync {
    fn create(&self, address: &str, kind: ConnectionKind) -> Result<Box<dyn PrinterConnection>>;
}

/// Raw TCP for network printers, the platform radio for everything else.
pub struct TransportConnectionFactory {
    radio: Arc<dyn RadioConnector>,
    tcp_port: u16,
    timeout: Duration,
}

impl TransportConnectionFactory {
    pub fn new(radio: Arc<dyn RadioConnector>, config: &EngineConfig) -> Self {
        Self {
            radio,
            tcp_port: config.tcp_port,
            timeout: config.connect_timeout(),
        }
    }
}

impl ConnectionFactory for TransportConnectionFactory {
    fn create(&self, address: &str, kind: ConnectionKind) -> Result<Box<dyn PrinterConnection>> {
        match kind {
            ConnectionKind::Tcp => Ok(Box::new(TcpConnection::new(address, self.tcp_port, self.timeout))),
            ConnectionKind::ClassicRadio => self.radio.classic(address),
            ConnectionKind::LowEnergyRadio => self.radio.low_energy(address),
        }
    }
}

/// Shared reference to the manager's live connection.
///
/// Clones refer to the same underlying connection.
#[derive(Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    address: String,
    kind: ConnectionKind,
    transport: Option<TransportType>,
    inner: Arc<Mutex<Box<dyn PrinterConnection>>>,
}

impl ConnectionHandle {
    fn new(
        address: &str,
        kind: ConnectionKind,
        transport: Option<TransportType>,
        connection: Box<dyn PrinterConnection>,
    ) -> Self {
        Self {
            id: ConnectionId::new(),
            address: address.to_owned(),
            kind,
            transport,
            inner: Arc::new(Mutex::new(connection)),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn kind(&self) -> ConnectionKind {
        self.kind
    }

    /// The transport the caller asked for, if any.
    pub fn transport(&self) -> Option<TransportType> {
        self.transport
    }

    /// Exclusive access to the connection for one operation.
    pub async fn lock(&self) -> MutexGuard<'_, Box<dyn PrinterConnection>> {
        self.inner.lock().await
    }

    pub fn same_as(&self, other: &ConnectionHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.id)
            .field("address", &self.address)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Connection kind for `address` when the caller may not know its transport.
///
/// A known transport decides. Otherwise an IPv4 dotted quad means TCP and
/// anything else is taken to be a classic radio address.
pub fn resolve_kind(address: &str, transport: Option<TransportType>) -> ConnectionKind {
    match transport {
        Some(transport) => transport.connection_kind(),
        None if is_ipv4_address(address) => ConnectionKind::Tcp,
        None => ConnectionKind::ClassicRadio,
    }
}

pub fn is_ipv4_address(address: &str) -> bool {
    address
        .parse::<Ipv4Addr>()
        .is_ok_and(|ip| ip.octets()[0] != 0)
}

/// Owner of the single live printer connection.
pub struct ConnectionManager {
    factory: Arc<dyn ConnectionFactory>,
    current: Mutex<Option<ConnectionHandle>>,
}

impl ConnectionManager {
    pub fn new(factory: Arc<dyn ConnectionFactory>) -> Self {
        Self {
            factory,
            current: Mutex::new(None),
        }
    }

    /// Return a connection for `address`, reusing the live one when it is
    /// for the same address and kind, still open, and no reconnection is
    /// forced. New connections are returned unopened.
    pub async fn get_connection(
        &self,
        address: &str,
        transport: Option<TransportType>,
        force_reconnection: bool,
    ) -> Result<ConnectionHandle> {
        let kind = resolve_kind(address, transport);
        let mut current = self.current.lock().await;

        if let Some(live) = current.as_ref() {
            if !force_reconnection && live.address == address && live.kind == kind {
                if live.lock().await.is_open() {
                    debug!(%address, id = %live.id, "reusing connection");
                    return Ok(live.clone());
                }
                debug!(%address, "live connection is closed, recreating");
            }
        }

        if let Some(previous) = current.take() {
            close_quietly(&previous).await;
        }

        let connection = self.factory.create(address, kind)?;
        let handle = ConnectionHandle::new(address, kind, transport, connection);
        info!(%address, ?kind, id = %handle.id, forced = force_reconnection, "created connection");
        *current = Some(handle.clone());
        Ok(handle)
    }

    /// The live connection, if any.
    pub async fn current(&self) -> Option<ConnectionHandle> {
        self.current.lock().await.clone()
    }

    /// Close and forget the live connection. Idempotent.
    pub async fn close_connections(&self) {
        let previous = self.current.lock().await.take();
        if let Some(previous) = previous {
            close_quietly(&previous).await;
        }
    }
}

async fn close_quietly(handle: &ConnectionHandle) {
    let mut connection = handle.lock().await;
    match connection.close().await {
        Ok(()) => debug!(address = %handle.address, id = %handle.id, "connection closed"),
        Err(e) => warn!(address = %handle.address, error = %e, "closing connection failed, ignoring"),
    }
}
