// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Etikett Print: multi-transport printer discovery, connection management,
// status probing and print orchestration. Platform radios are reached through
// the traits in `etikett-bridge`; network printers are found over mDNS and
// driven over raw TCP.

pub mod connection;
pub mod discovery;
pub mod mdns;
pub mod orchestrator;
pub mod payload;
pub mod retry;
pub mod status;
pub mod store;
pub mod tcp_client;

#[cfg(test)]
pub(crate) mod test_support;

pub use connection::{ConnectionFactory, ConnectionHandle, ConnectionManager, TransportConnectionFactory};
pub use discovery::{DiscoveryAggregator, ProgressStream, TransportDiscoverer, discovery_statuses};
pub use mdns::MdnsScanner;
pub use orchestrator::{Collaborators, PrintOrchestrator};
pub use payload::LabelPayload;
pub use status::StatusProbe;
pub use store::{MemorySelectionStore, SqliteSelectionStore};
pub use tcp_client::{TcpConnection, parse_host_status};
