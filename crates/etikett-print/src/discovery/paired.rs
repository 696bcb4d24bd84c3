// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Discovery over the host radio's paired-device list.
//
// Paired devices are classified by their radio device class. Printers are
// accepted outright. Uncategorized devices are accepted too, unless strict
// filtering is on, in which case they must advertise the serial-port
// service. When their service list is unknown a lookup is requested and the
// device is admitted once the lookup reports the service.

use std::sync::Arc;
use std::time::Duration;

use async_stream::try_stream;
use futures::Stream;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, info, warn};

use etikett_bridge::traits::{PairedDeviceSource, ScanEvent};
use etikett_core::error::{EtikettError, Result};
use etikett_core::types::{DeviceFilter, Printer, ScannedDevice, TransportType};

use super::snapshot::Snapshot;
use super::{SnapshotStream, TransportDiscoverer, admits, ensure_available, start_scan};

/// Radio device class reported by label and receipt printers.
pub const PRINTER_DEVICE_CLASS: u32 = 1664;

/// Radio major class for devices that do not categorize themselves.
pub const UNCATEGORIZED_DEVICE_CLASS: u32 = 0x1F00;

/// Serial-port profile service identifier.
pub const SERIAL_PORT_SERVICE: &str = "00001101-0000-1000-8000-00805F9B34FB";

/// Outcome of the device-class check for one paired device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassVerdict {
    Accept,
    /// Admissible only once its services are known.
    Defer,
    Reject,
}

pub fn device_class_verdict(device: &ScannedDevice, strict_generic_filtering: bool) -> ClassVerdict {
    match device.device_class {
        Some(PRINTER_DEVICE_CLASS) => ClassVerdict::Accept,
        Some(UNCATEGORIZED_DEVICE_CLASS) if !strict_generic_filtering => ClassVerdict::Accept,
        Some(UNCATEGORIZED_DEVICE_CLASS) => match device.service_uuids.as_deref() {
            None | Some([]) => ClassVerdict::Defer,
            Some(services) if advertises_serial_port(services) => ClassVerdict::Accept,
            Some(_) => ClassVerdict::Reject,
        },
        _ => ClassVerdict::Reject,
    }
}

pub fn advertises_serial_port(services: &[String]) -> bool {
    services.iter().any(|uuid| uuid.eq_ignore_ascii_case(SERIAL_PORT_SERVICE))
}

/// `TransportDiscoverer` over a `PairedDeviceSource`.
pub struct PairedListDiscoverer {
    source: Arc<dyn PairedDeviceSource>,
    service_fetch_timeout: Duration,
}

impl PairedListDiscoverer {
    pub fn new(source: Arc<dyn PairedDeviceSource>, service_fetch_timeout: Duration) -> Self {
        Self { source, service_fetch_timeout }
    }
}

impl TransportDiscoverer for PairedListDiscoverer {
    fn transport(&self) -> TransportType {
        TransportType::PairedRadio
    }

    fn discover(&self, filter: Option<DeviceFilter>, strict_generic_filtering: bool) -> SnapshotStream {
        Box::pin(paired_snapshots(
            Arc::clone(&self.source),
            filter,
            strict_generic_filtering,
            self.service_fetch_timeout,
        ))
    }
}

fn paired_snapshots(
    source: Arc<dyn PairedDeviceSource>,
    filter: Option<DeviceFilter>,
    strict_generic_filtering: bool,
    service_fetch_timeout: Duration,
) -> impl Stream<Item = Result<Vec<Printer>>> + Send + 'static {
    const TRANSPORT: TransportType = TransportType::PairedRadio;

    try_stream! {
        ensure_available(TRANSPORT, source.availability())?;
        let devices = source
            .paired_devices()
            .map_err(|e| EtikettError::Discovery(format!("cannot list paired devices: {e}")))?;

        let mut snapshot = Snapshot::new();
        let mut deferred: Vec<ScannedDevice> = Vec::new();
        for device in devices {
            if !admits(filter.as_ref(), &device) {
                continue;
            }
            match device_class_verdict(&device, strict_generic_filtering) {
                ClassVerdict::Accept => {
                    snapshot.upsert(Printer::from_scanned(&device, TRANSPORT));
                }
                ClassVerdict::Defer => deferred.push(device),
                ClassVerdict::Reject => {
                    debug!(address = %device.address, class = ?device.device_class, "not a printer");
                }
            }
        }
        info!(accepted = snapshot.len(), deferred = deferred.len(), "paired devices classified");
        yield snapshot.to_vec();

        if !deferred.is_empty() {
            let addresses: Vec<String> = deferred.iter().map(|d| d.address.clone()).collect();
            match start_scan(TRANSPORT, |on_event| source.fetch_services(&addresses, on_event)) {
                Err(e) => warn!(error = %e, "service lookup unavailable, deferred devices skipped"),
                Ok((_guard, mut events)) => {
                    let deadline = Instant::now() + service_fetch_timeout;
                    while !deferred.is_empty() {
                        let event = match timeout_at(deadline, events.recv()).await {
                            Ok(Some(event)) => event,
                            Ok(None) => break,
                            Err(_) => {
                                debug!(pending = deferred.len(), "service lookup timed out");
                                break;
                            }
                        };
                        match event {
                            ScanEvent::ServicesResolved { address, service_uuids } => {
                                let Some(position) = deferred.iter().position(|d| d.address == address) else {
                                    continue;
                                };
                                let device = deferred.remove(position);
                                if advertises_serial_port(&service_uuids) {
                                    snapshot.upsert(Printer::from_scanned(&device, TRANSPORT));
                                    yield snapshot.to_vec();
                                } else {
                                    debug!(address = %device.address, "no serial-port service");
                                }
                            }
                            ScanEvent::Found(_) => {}
                            ScanEvent::Finished => break,
                            ScanEvent::Error(message) => {
                                warn!(%message, "service lookup failed");
                                break;
                            }
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakePairedSource;
    use etikett_bridge::traits::Availability;
    use futures::StreamExt;

    fn paired(address: &str, class: u32, services: Option<&[&str]>) -> ScannedDevice {
        ScannedDevice {
            address: address.into(),
            name: Some(format!("dev-{address}")),
            device_class: Some(class),
            service_uuids: services.map(|s| s.iter().map(|u| u.to_string()).collect()),
        }
    }

    #[test]
    fn class_predicate() {
        let printer = paired("A", PRINTER_DEVICE_CLASS, None);
        let generic = paired("B", UNCATEGORIZED_DEVICE_CLASS, None);
        let generic_spp = paired("C", UNCATEGORIZED_DEVICE_CLASS, Some(&["00001101-0000-1000-8000-00805f9b34fb"]));
        let generic_audio = paired("D", UNCATEGORIZED_DEVICE_CLASS, Some(&["0000110b-0000-1000-8000-00805f9b34fb"]));
        let headset = paired("E", 0x0404, None);

        assert_eq!(device_class_verdict(&printer, true), ClassVerdict::Accept);
        assert_eq!(device_class_verdict(&generic, false), ClassVerdict::Accept);
        assert_eq!(device_class_verdict(&generic, true), ClassVerdict::Defer);
        assert_eq!(device_class_verdict(&generic_spp, true), ClassVerdict::Accept);
        assert_eq!(device_class_verdict(&generic_audio, true), ClassVerdict::Reject);
        assert_eq!(device_class_verdict(&headset, false), ClassVerdict::Reject);
    }

    #[tokio::test]
    async fn lists_printers_from_paired_devices() {
        let source = FakePairedSource::new(vec![
            paired("A", PRINTER_DEVICE_CLASS, None),
            paired("B", 0x0404, None),
            paired("C", UNCATEGORIZED_DEVICE_CLASS, None),
        ]);
        let discoverer = PairedListDiscoverer::new(source, Duration::from_secs(1));

        let snapshots: Vec<_> = discoverer.discover(None, false).collect().await;
        assert_eq!(snapshots.len(), 1);
        let addresses: Vec<_> = snapshots[0].as_ref().unwrap().iter().map(|p| p.address.as_str()).collect();
        assert_eq!(addresses, ["A", "C"]);
    }

    #[tokio::test]
    async fn strict_mode_admits_generic_device_after_service_lookup() {
        let source = FakePairedSource::new(vec![
            paired("A", PRINTER_DEVICE_CLASS, None),
            paired("B", UNCATEGORIZED_DEVICE_CLASS, None),
            paired("C", UNCATEGORIZED_DEVICE_CLASS, None),
        ])
        .resolving(vec![
            ScanEvent::ServicesResolved { address: "B".into(), service_uuids: vec![SERIAL_PORT_SERVICE.into()] },
            ScanEvent::ServicesResolved { address: "C".into(), service_uuids: vec![] },
        ]);
        let discoverer = PairedListDiscoverer::new(source.clone(), Duration::from_secs(1));

        let snapshots: Vec<_> = discoverer.discover(None, true).collect().await;
        let sizes: Vec<_> = snapshots.iter().map(|s| s.as_ref().unwrap().len()).collect();
        assert_eq!(sizes, [1, 2]);
        assert_eq!(source.requested_lookups(), vec!["B".to_string(), "C".to_string()]);
    }

    #[tokio::test]
    async fn unanswered_lookup_times_out() {
        let source = FakePairedSource::new(vec![paired("B", UNCATEGORIZED_DEVICE_CLASS, None)]);
        let discoverer = PairedListDiscoverer::new(source, Duration::from_millis(50));

        let snapshots: Vec<_> = discoverer.discover(None, true).collect().await;
        assert_eq!(snapshots.len(), 1);
        assert!(snapshots[0].as_ref().unwrap().is_empty());
    }

    #[tokio::test]
    async fn absent_radio_is_a_discovery_error() {
        let source = FakePairedSource::new(vec![]).with_availability(Availability::Absent);
        let discoverer = PairedListDiscoverer::new(source, Duration::from_secs(1));

        let snapshots: Vec<_> = discoverer.discover(None, false).collect().await;
        assert!(matches!(snapshots.as_slice(), [Err(EtikettError::Discovery(_))]));
    }
}
