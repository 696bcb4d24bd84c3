// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-agnostic capability traits.
//
// The engine never touches a radio stack, a key-value store or a dialog
// directly. Everything outside the engine is reached through one of these
// narrow interfaces, and each platform (or test) supplies implementations.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;

use etikett_core::error::Result;
use etikett_core::types::{DiscoveryProgress, Printer, PrinterState, ScannedDevice};

/// Unified bridge that groups the native capabilities of one platform.
pub trait PlatformBridge: Send + Sync {
    /// Human-readable platform name (e.g. "Android 14", "Desktop (stub)").
    fn platform_name(&self) -> &str;

    fn access_checker(&self) -> Arc<dyn AccessChecker>;

    fn paired_devices(&self) -> Arc<dyn PairedDeviceSource>;

    fn broadcast_scanner(&self) -> Arc<dyn TransportScanner>;

    fn low_energy_scanner(&self) -> Arc<dyn TransportScanner>;

    fn radio_connector(&self) -> Arc<dyn RadioConnector>;
}

// -- Access rights ----------------------------------------------------------

/// Outcome of an access-rights check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessStatus {
    Granted,
    /// Names of the rights still missing.
    Missing(Vec<String>),
}

/// Checks that the caller holds the rights discovery and connections need.
pub trait AccessChecker: Send + Sync {
    fn check_required(&self) -> AccessStatus;
}

// -- Selection persistence --------------------------------------------------

/// Persists the last printer the user chose.
///
/// `load` must reflect the most recent completed `save`.
#[async_trait]
pub trait SelectionStore: Send + Sync {
    async fn save(&self, printer: &Printer) -> Result<()>;

    async fn load(&self) -> Result<Option<Printer>>;

    /// Current selection first, then every subsequent change.
    fn observe(&self) -> BoxStream<'static, Option<Printer>>;
}

// -- Candidate selection ----------------------------------------------------

/// Live feed of discovery snapshots handed to a candidate selector.
///
/// Always yields the latest snapshot (intermediate ones may be skipped when
/// the selector is slow) and ends when discovery completes.
pub type CandidateFeed = BoxStream<'static, DiscoveryProgress>;

/// Turns a live discovery feed into one chosen printer.
#[async_trait]
pub trait CandidateSelector: Send + Sync {
    /// Returns `Ok(None)` when the user dismissed the choice.
    ///
    /// The returned future may be dropped mid-flight when discovery fails;
    /// implementations must tolerate that.
    async fn select(&self, feed: CandidateFeed) -> Result<Option<Printer>>;
}

// -- Transport scanning -----------------------------------------------------

/// Whether a transport can scan at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Enabled,
    /// Hardware present but switched off.
    Disabled,
    /// No hardware for this transport.
    Absent,
}

/// Events a scan reports through its callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    /// A device was found, or found again with fresher details.
    Found(ScannedDevice),
    /// A service lookup requested for `address` completed.
    ServicesResolved {
        address: String,
        service_uuids: Vec<String>,
    },
    /// The scan ended normally. No further events follow.
    Finished,
    /// The scan failed. No further events follow.
    Error(String),
}

/// Callback invoked by a transport for every scan event, possibly from a
/// transport-owned thread.
pub type ScanCallback = Arc<dyn Fn(ScanEvent) + Send + Sync>;

/// A running scan. Stopping releases the transport's scanning resources.
pub trait ActiveScan: Send {
    /// Idempotent.
    fn stop(&mut self);
}

/// A callback-driven scanner for one transport (broadcast radio, low-energy
/// radio, network service browsing).
pub trait TransportScanner: Send + Sync {
    fn availability(&self) -> Availability;

    fn start_scan(&self, on_event: ScanCallback) -> Result<Box<dyn ActiveScan>>;
}

/// The host radio's list of paired devices.
pub trait PairedDeviceSource: Send + Sync {
    fn availability(&self) -> Availability;

    fn paired_devices(&self) -> Result<Vec<ScannedDevice>>;

    /// Ask the radio to look up the services advertised by `addresses`.
    /// Results arrive as `ScanEvent::ServicesResolved`.
    fn fetch_services(&self, addresses: &[String], on_event: ScanCallback) -> Result<Box<dyn ActiveScan>>;
}

// -- Connections ------------------------------------------------------------

/// One transport-level link to a printer.
///
/// Connectivity failures are reported as `EtikettError::Connection`.
#[async_trait]
pub trait PrinterConnection: Send {
    async fn open(&mut self) -> Result<()>;

    fn is_open(&self) -> bool;

    async fn close(&mut self) -> Result<()>;

    async fn write(&mut self, data: &[u8]) -> Result<()>;

    async fn query_status(&mut self) -> Result<PrinterState>;
}

/// Creates radio connections; network connections are handled by the engine.
pub trait RadioConnector: Send + Sync {
    fn classic(&self, address: &str) -> Result<Box<dyn PrinterConnection>>;

    fn low_energy(&self, address: &str) -> Result<Box<dyn PrinterConnection>>;
}

// -- Payloads ---------------------------------------------------------------

/// Writes one print request's content to an open-able connection.
#[async_trait]
pub trait SendAction: Send + Sync {
    async fn send(&self, connection: &mut dyn PrinterConnection) -> Result<()>;
}
