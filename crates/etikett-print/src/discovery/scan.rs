// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Discoverer for transports that find devices by scanning: classic radio
// inquiry, low-energy scans and network service browsing.

use std::sync::Arc;

use async_stream::try_stream;
use futures::Stream;
use tracing::{debug, info};

use etikett_bridge::traits::{ScanEvent, TransportScanner};
use etikett_core::error::Result;
use etikett_core::types::{DeviceFilter, Printer, TransportType};

use super::snapshot::Snapshot;
use super::{SnapshotStream, TransportDiscoverer, admits, ensure_available, scan_failed, start_scan};

/// A `TransportDiscoverer` over any callback-driven `TransportScanner`.
///
/// Only the caller's filter applies; every reported device is a candidate.
pub struct ScanDiscoverer {
    transport: TransportType,
    scanner: Arc<dyn TransportScanner>,
}

impl ScanDiscoverer {
    pub fn broadcast(scanner: Arc<dyn TransportScanner>) -> Self {
        Self { transport: TransportType::Broadcast, scanner }
    }

    pub fn low_energy(scanner: Arc<dyn TransportScanner>) -> Self {
        Self { transport: TransportType::LowEnergy, scanner }
    }

    pub fn network(scanner: Arc<dyn TransportScanner>) -> Self {
        Self { transport: TransportType::Network, scanner }
    }
}

impl TransportDiscoverer for ScanDiscoverer {
    fn transport(&self) -> TransportType {
        self.transport
    }

    fn discover(&self, filter: Option<DeviceFilter>, _strict_generic_filtering: bool) -> SnapshotStream {
        Box::pin(scan_snapshots(self.transport, Arc::clone(&self.scanner), filter))
    }
}

fn scan_snapshots(
    transport: TransportType,
    scanner: Arc<dyn TransportScanner>,
    filter: Option<DeviceFilter>,
) -> impl Stream<Item = Result<Vec<Printer>>> + Send + 'static {
    try_stream! {
        ensure_available(transport, scanner.availability())?;
        let (_guard, mut events) = start_scan(transport, |on_event| scanner.start_scan(on_event))?;
        info!(transport = ?transport, "scan started");

        let mut snapshot = Snapshot::new();
        while let Some(event) = events.recv().await {
            match event {
                ScanEvent::Found(device) => {
                    if !admits(filter.as_ref(), &device) {
                        debug!(transport = ?transport, address = %device.address, "filtered out");
                        continue;
                    }
                    if snapshot.upsert(Printer::from_scanned(&device, transport)) {
                        yield snapshot.to_vec();
                    }
                }
                ScanEvent::ServicesResolved { .. } => {}
                ScanEvent::Finished => break,
                ScanEvent::Error(message) => scan_failed(transport, message)?,
            }
        }
        info!(transport = ?transport, found = snapshot.len(), "scan finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeScanner;
    use etikett_bridge::traits::Availability;
    use etikett_core::error::EtikettError;
    use etikett_core::types::ScannedDevice;
    use futures::StreamExt;

    fn found(address: &str, name: &str) -> ScanEvent {
        ScanEvent::Found(ScannedDevice::new(address, Some(name.into())))
    }

    #[tokio::test]
    async fn emits_growing_snapshots_until_finished() {
        let scanner = FakeScanner::scripted(vec![
            found("AA", "one"),
            found("BB", "two"),
            found("AA", "one"),
            found("AA", "renamed"),
            ScanEvent::Finished,
        ]);
        let discoverer = ScanDiscoverer::broadcast(scanner.clone());

        let snapshots: Vec<_> = discoverer.discover(None, false).collect().await;
        let sizes: Vec<_> = snapshots.iter().map(|s| s.as_ref().unwrap().len()).collect();
        // The unchanged rediscovery of "AA" is not re-emitted.
        assert_eq!(sizes, [1, 2, 2]);

        let last = snapshots.last().unwrap().as_ref().unwrap();
        assert_eq!(last[0].display_name(), "renamed");
        assert!(last.iter().all(|p| p.transport == TransportType::Broadcast));
        assert_eq!(scanner.stop_count(), 1);
    }

    #[tokio::test]
    async fn caller_filter_drops_devices() {
        let scanner = FakeScanner::scripted(vec![found("AA", "ZD420"), found("BB", "Headset"), ScanEvent::Finished]);
        let discoverer = ScanDiscoverer::low_energy(scanner);
        let filter = DeviceFilter::new(|d| d.name.as_deref() == Some("ZD420"));

        let snapshots: Vec<_> = discoverer.discover(Some(filter), false).collect().await;
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].as_ref().unwrap()[0].address, "AA");
    }

    #[tokio::test]
    async fn disabled_radio_fails_immediately() {
        let scanner = FakeScanner::with_availability(Availability::Disabled);
        let discoverer = ScanDiscoverer::broadcast(scanner.clone());

        let snapshots: Vec<_> = discoverer.discover(None, false).collect().await;
        assert_eq!(snapshots.len(), 1);
        assert!(matches!(snapshots[0], Err(EtikettError::Discovery(_))));
        assert_eq!(scanner.start_count(), 0);
    }

    #[tokio::test]
    async fn scan_error_ends_the_stream_with_an_error() {
        let scanner = FakeScanner::scripted(vec![found("AA", "one"), ScanEvent::Error("radio reset".into())]);
        let discoverer = ScanDiscoverer::network(scanner);

        let snapshots: Vec<_> = discoverer.discover(None, false).collect().await;
        assert_eq!(snapshots.len(), 2);
        assert!(snapshots[0].is_ok());
        assert!(matches!(&snapshots[1], Err(EtikettError::Discovery(m)) if m.contains("radio reset")));
    }

    #[tokio::test]
    async fn dropping_the_stream_stops_the_scan() {
        let scanner = FakeScanner::scripted(vec![found("AA", "one")]);
        let discoverer = ScanDiscoverer::broadcast(scanner.clone());

        let mut stream = discoverer.discover(None, false);
        assert!(stream.next().await.is_some());
        assert_eq!(scanner.stop_count(), 0);
        drop(stream);
        assert_eq!(scanner.stop_count(), 1);
    }
}
