// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printer discovery across transports.
//
// Every transport's callback-driven scan is turned into a finite stream of
// full printer snapshots. Dropping the stream stops the scan. The aggregator
// combines the per-transport streams into one progressive session.

pub mod aggregator;
pub mod paired;
pub mod scan;
pub mod snapshot;

use std::sync::Arc;

use futures::stream::BoxStream;
use tokio::sync::mpsc;
use tracing::debug;

use etikett_bridge::traits::{ActiveScan, Availability, ScanCallback, ScanEvent};
use etikett_core::error::{EtikettError, Result};
use etikett_core::types::{DeviceFilter, Printer, ScannedDevice, TransportType};

pub use aggregator::{DiscoveryAggregator, ProgressStream, discovery_statuses};
pub use paired::PairedListDiscoverer;
pub use scan::ScanDiscoverer;
pub use snapshot::Snapshot;

/// Full printer lists from one transport, oldest first. Each item replaces
/// the previous one. An `Err` item ends the stream.
pub type SnapshotStream = BoxStream<'static, Result<Vec<Printer>>>;

/// One transport's discovery.
pub trait TransportDiscoverer: Send + Sync {
    fn transport(&self) -> TransportType;

    /// Start a new scan. The returned stream is not restartable; call
    /// `discover` again for another session.
    fn discover(&self, filter: Option<DeviceFilter>, strict_generic_filtering: bool) -> SnapshotStream;
}

/// Stops the wrapped scan when dropped.
pub(crate) struct ScanGuard {
    transport: TransportType,
    scan: Box<dyn ActiveScan>,
}

impl Drop for ScanGuard {
    fn drop(&mut self) {
        debug!(transport = ?self.transport, "stopping scan");
        self.scan.stop();
    }
}

/// Start a scan whose callback events are delivered through a channel.
pub(crate) fn start_scan(
    transport: TransportType,
    start: impl FnOnce(ScanCallback) -> Result<Box<dyn ActiveScan>>,
) -> Result<(ScanGuard, mpsc::UnboundedReceiver<ScanEvent>)> {
    let (tx, rx) = mpsc::unbounded_channel();
    let on_event: ScanCallback = Arc::new(move |event| {
        // The receiver is gone once the consumer dropped the stream.
        let _ = tx.send(event);
    });
    let scan = start(on_event).map_err(|e| match e {
        EtikettError::Discovery(_) => e,
        other => EtikettError::Discovery(format!("cannot start {transport} scan: {other}")),
    })?;
    Ok((ScanGuard { transport, scan }, rx))
}

/// A transport that is missing or switched off fails the session up front.
pub(crate) fn ensure_available(transport: TransportType, availability: Availability) -> Result<()> {
    match availability {
        Availability::Enabled => Ok(()),
        Availability::Disabled => Err(EtikettError::Discovery(format!(
            "{transport} radio is currently disabled"
        ))),
        Availability::Absent => Err(EtikettError::Discovery(format!("no {transport} radio found"))),
    }
}

pub(crate) fn scan_failed(transport: TransportType, message: String) -> Result<()> {
    Err(EtikettError::Discovery(format!("{transport} scan failed: {message}")))
}

pub(crate) fn admits(filter: Option<&DeviceFilter>, device: &ScannedDevice) -> bool {
    filter.is_none_or(|filter| filter.allows(device))
}
