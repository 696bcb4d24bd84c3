// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::TransportType;

/// How the enabled transports are combined into one discovery session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryStrategy {
    /// One transport at a time, in priority order. Avoids radio contention.
    #[default]
    Sequential,
    /// All transports at once, merged on every update.
    Concurrent,
}

/// Persistent engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Only accept uncategorized paired devices that advertise a serial-port service.
    pub strict_generic_filtering: bool,
    /// Transports searched during discovery.
    pub transports: Vec<TransportType>,
    pub discovery_strategy: DiscoveryStrategy,
    /// Fall back to discovery when the stored printer reports a physical fault.
    pub reselect_when_not_ready: bool,
    /// Raw TCP port for network printers (default 9100).
    pub tcp_port: u16,
    /// Timeout for opening a connection and for status replies.
    pub connect_timeout_secs: u64,
    /// How long a network browse runs before it reports completion.
    pub network_browse_secs: u64,
    /// How long the paired-list search waits for deferred service lookups.
    pub service_fetch_timeout_secs: u64,
}

impl EngineConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn network_browse_window(&self) -> Duration {
        Duration::from_secs(self.network_browse_secs)
    }

    pub fn service_fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.service_fetch_timeout_secs)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            strict_generic_filtering: false,
            transports: TransportType::ALL.to_vec(),
            discovery_strategy: DiscoveryStrategy::Sequential,
            reselect_when_not_ready: true,
            tcp_port: 9100,
            connect_timeout_secs: 15,
            network_browse_secs: 5,
            service_fetch_timeout_secs: 10,
        }
    }
}
