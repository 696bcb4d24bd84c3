// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Etikett label printing engine.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The medium used to reach a printer.
///
/// Variants are declared in discovery priority order, so `Ord` matches the
/// order in which the sequential discovery strategy visits transports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TransportType {
    /// A device already paired with this host's short-range radio.
    #[serde(rename = "paired")]
    PairedRadio,
    /// Found by a classic radio inquiry (broadcast discovery).
    #[serde(rename = "bluetooth")]
    Broadcast,
    /// Found by a low-energy radio scan.
    #[serde(rename = "ble")]
    LowEnergy,
    /// Found on the local network.
    #[serde(rename = "network")]
    Network,
}

impl TransportType {
    /// Every transport, in discovery priority order.
    pub const ALL: [TransportType; 4] = [
        Self::PairedRadio,
        Self::Broadcast,
        Self::LowEnergy,
        Self::Network,
    ];

    /// Stable identifier used by persisted selections.
    pub fn id(&self) -> &'static str {
        match self {
            Self::PairedRadio => "paired",
            Self::Broadcast => "bluetooth",
            Self::LowEnergy => "ble",
            Self::Network => "network",
        }
    }

    /// Parse a persisted identifier. Unknown identifiers fall back to
    /// `Broadcast`, the classic radio transport older selections used.
    pub fn from_id(id: &str) -> Self {
        match id {
            "paired" => Self::PairedRadio,
            "ble" => Self::LowEnergy,
            "network" => Self::Network,
            _ => Self::Broadcast,
        }
    }

    /// The kind of connection used to talk to a printer on this transport.
    pub fn connection_kind(&self) -> ConnectionKind {
        match self {
            Self::PairedRadio | Self::Broadcast => ConnectionKind::ClassicRadio,
            Self::LowEnergy => ConnectionKind::LowEnergyRadio,
            Self::Network => ConnectionKind::Tcp,
        }
    }
}

impl fmt::Display for TransportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::PairedRadio => "paired devices",
            Self::Broadcast => "Bluetooth",
            Self::LowEnergy => "Bluetooth LE",
            Self::Network => "network",
        };
        f.write_str(label)
    }
}

/// Physical connection flavour created by a connection factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionKind {
    /// Serial-port profile over classic short-range radio.
    ClassicRadio,
    /// Low-energy radio link.
    LowEnergyRadio,
    /// Raw TCP socket.
    Tcp,
}

/// A printer as seen by discovery and stored as the selection.
///
/// Two printers with the same `address` and `transport` are the same device
/// even when their friendly names differ.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Printer {
    pub address: String,
    #[serde(rename = "name")]
    pub friendly_name: Option<String>,
    #[serde(rename = "typeId")]
    pub transport: TransportType,
}

impl Printer {
    pub fn new(
        address: impl Into<String>,
        friendly_name: Option<String>,
        transport: TransportType,
    ) -> Self {
        Self {
            address: address.into(),
            friendly_name,
            transport,
        }
    }

    /// Build a printer record from a raw scan result.
    pub fn from_scanned(device: &ScannedDevice, transport: TransportType) -> Self {
        Self::new(device.address.clone(), device.name.clone(), transport)
    }

    /// Deduplication identity.
    pub fn identity(&self) -> (&str, TransportType) {
        (&self.address, self.transport)
    }

    pub fn same_device(&self, other: &Printer) -> bool {
        self.identity() == other.identity()
    }

    /// Name for display: the friendly name if known, otherwise the address.
    pub fn display_name(&self) -> &str {
        self.friendly_name.as_deref().unwrap_or(&self.address)
    }
}

impl fmt::Display for Printer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {})", self.display_name(), self.address, self.transport)
    }
}

/// A raw device report from a transport scan, before it becomes a `Printer`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScannedDevice {
    pub address: String,
    pub name: Option<String>,
    /// Radio device class, when the transport reports one.
    pub device_class: Option<u32>,
    /// Advertised service identifiers. `None` means not fetched yet.
    pub service_uuids: Option<Vec<String>>,
}

impl ScannedDevice {
    pub fn new(address: impl Into<String>, name: Option<String>) -> Self {
        Self {
            address: address.into(),
            name,
            ..Self::default()
        }
    }
}

/// Caller-supplied predicate applied to scanned devices before they are
/// admitted into a discovery snapshot.
#[derive(Clone)]
pub struct DeviceFilter(Arc<dyn Fn(&ScannedDevice) -> bool + Send + Sync>);

impl DeviceFilter {
    pub fn new(predicate: impl Fn(&ScannedDevice) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(predicate))
    }

    pub fn allows(&self, device: &ScannedDevice) -> bool {
        (self.0)(device)
    }
}

impl fmt::Debug for DeviceFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DeviceFilter(..)")
    }
}

/// Status line attached to a discovery progress snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressMessage {
    /// Discovery session just started.
    Starting,
    /// The sequential strategy is scanning this transport.
    Searching(TransportType),
    /// The concurrent strategy is scanning every enabled transport.
    SearchingAll,
    /// All transports finished.
    Done,
}

impl fmt::Display for ProgressMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Starting => f.write_str("Searching for printers…"),
            Self::Searching(transport) => write!(f, "Searching {transport}…"),
            Self::SearchingAll => f.write_str("Searching all connections…"),
            Self::Done => f.write_str("Search complete"),
        }
    }
}

/// One progressive snapshot of a discovery session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryProgress {
    /// Printers seen so far, in discovery order.
    pub printers: Vec<Printer>,
    pub message: Option<ProgressMessage>,
}

impl DiscoveryProgress {
    pub fn new(printers: Vec<Printer>, message: Option<ProgressMessage>) -> Self {
        Self { printers, message }
    }
}

/// Coarse view of a discovery session for front ends that render state
/// rather than raw snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryStatus {
    InProgress,
    Updated(Vec<Printer>),
    /// Rendered error text; the session is over.
    Error(String),
    Completed(Vec<Printer>),
}

/// Point-in-time readiness of a printer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrinterState {
    pub head_open: bool,
    pub head_too_hot: bool,
    pub head_cold: bool,
    pub paper_out: bool,
    pub ribbon_out: bool,
    pub receive_buffer_full: bool,
    pub paused: bool,
    pub partial_format_in_progress: bool,
}

impl PrinterState {
    /// True when no fault flag is set and the printer is not paused.
    pub fn is_ready_to_print(&self) -> bool {
        self.faults().is_empty() && !self.paused
    }

    /// Names of the fault flags currently set.
    pub fn faults(&self) -> Vec<&'static str> {
        [
            (self.head_open, "head open"),
            (self.head_too_hot, "head too hot"),
            (self.head_cold, "head cold"),
            (self.paper_out, "paper out"),
            (self.ribbon_out, "ribbon out"),
            (self.receive_buffer_full, "receive buffer full"),
        ]
        .into_iter()
        .filter_map(|(set, name)| set.then_some(name))
        .collect()
    }
}

impl fmt::Display for PrinterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut conditions = self.faults();
        if self.paused {
            conditions.push("paused");
        }
        if conditions.is_empty() {
            f.write_str("ready")
        } else {
            f.write_str(&conditions.join(", "))
        }
    }
}

/// Terminal success value of a print request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrintResponse {
    pub printer_name: Option<String>,
    pub printer_address: String,
}

/// Unique identifier of one established printer connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Phases of the print orchestration state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrintPhase {
    Idle,
    /// Checking access and loading the stored selection.
    Loading,
    Probing,
    Printing,
    /// Discovery running. The selector already sees candidates as they appear.
    Discovering,
    /// Discovery finished; the selector still has the final candidate list.
    Selecting,
    Persisting,
    Succeeded,
    Failed,
}

/// Classification of errors for retry logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorClass {
    /// Dropped or stale connection. One forced reconnection may fix it.
    Transient,
    /// Someone must act (load paper, close the head, grant access, pick a printer).
    UserAction,
    /// Retrying will not help.
    Permanent,
}
