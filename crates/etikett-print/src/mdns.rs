// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// mDNS browsing for raw-socket label printers on the local network.
//
// Network label printers advertise `_pdl-datastream._tcp.local.` (the raw
// page-description-language port). Each browse runs its own `mdns-sd`
// daemon, reports resolved services as scan events from a listener thread,
// and reports completion once the browse window has elapsed.

use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use mdns_sd::{ServiceDaemon, ServiceEvent, ServiceInfo};
use tracing::{debug, info, warn};

use etikett_bridge::traits::{ActiveScan, Availability, ScanCallback, ScanEvent, TransportScanner};
use etikett_core::error::{EtikettError, Result};
use etikett_core::types::ScannedDevice;

/// mDNS service type for raw-socket printers.
pub const PRINTER_SERVICE: &str = "_pdl-datastream._tcp.local.";

/// How often the listener re-checks the stop flag while idle.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// `TransportScanner` for the network transport.
pub struct MdnsScanner {
    browse_window: Duration,
}

impl MdnsScanner {
    pub fn new(browse_window: Duration) -> Self {
        Self { browse_window }
    }
}

impl TransportScanner for MdnsScanner {
    fn availability(&self) -> Availability {
        Availability::Enabled
    }

    fn start_scan(&self, on_event: ScanCallback) -> Result<Box<dyn ActiveScan>> {
        let daemon = ServiceDaemon::new()
            .map_err(|e| EtikettError::Discovery(format!("failed to start mDNS daemon: {e}")))?;
        let receiver = daemon
            .browse(PRINTER_SERVICE)
            .map_err(|e| EtikettError::Discovery(format!("browse {PRINTER_SERVICE}: {e}")))?;

        let stopped = Arc::new(AtomicBool::new(false));
        spawn_listener(receiver, on_event, self.browse_window, Arc::clone(&stopped))?;

        info!(window_secs = self.browse_window.as_secs(), "mDNS printer browse started");
        Ok(Box::new(MdnsBrowse { daemon: Some(daemon), stopped }))
    }
}

/// A running browse. Stopping shuts its daemon down.
struct MdnsBrowse {
    daemon: Option<ServiceDaemon>,
    stopped: Arc<AtomicBool>,
}

impl ActiveScan for MdnsBrowse {
    fn stop(&mut self) {
        self.stopped.store(true, Ordering::Relaxed);
        let Some(daemon) = self.daemon.take() else {
            return;
        };
        if let Err(e) = daemon.stop_browse(PRINTER_SERVICE) {
            debug!(error = %e, "stop browse failed");
        }
        match daemon.shutdown() {
            Ok(_status) => info!("mDNS printer browse stopped"),
            Err(e) => debug!(error = %e, "mDNS daemon shutdown failed"),
        }
    }
}

impl Drop for MdnsBrowse {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Drain the browse receiver on a dedicated thread until the window closes,
/// the browse is stopped, or the daemon goes away.
fn spawn_listener(
    receiver: mdns_sd::Receiver<ServiceEvent>,
    on_event: ScanCallback,
    window: Duration,
    stopped: Arc<AtomicBool>,
) -> Result<()> {
    std::thread::Builder::new()
        .name("mdns-printers".into())
        .spawn(move || {
            let deadline = Instant::now() + window;
            loop {
                if stopped.load(Ordering::Relaxed) {
                    return;
                }
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    break;
                }
                match receiver.recv_timeout(remaining.min(POLL_INTERVAL)) {
                    Ok(ServiceEvent::ServiceResolved(info)) => match service_info_to_device(&info) {
                        Some(device) => {
                            debug!(address = %device.address, name = ?device.name, "printer resolved");
                            on_event(ScanEvent::Found(device));
                        }
                        None => warn!(fullname = %info.get_fullname(), "resolved service has no address"),
                    },
                    Ok(ServiceEvent::SearchStopped(_)) => break,
                    Ok(_) => {}
                    Err(_) if receiver.is_disconnected() => break,
                    Err(_) => {}
                }
            }
            if !stopped.load(Ordering::Relaxed) {
                on_event(ScanEvent::Finished);
            }
        })?;
    Ok(())
}

/// Convert a resolved service into a scanned device, preferring IPv4.
fn service_info_to_device(info: &ServiceInfo) -> Option<ScannedDevice> {
    let addresses = info.get_addresses();
    let ip: IpAddr = addresses
        .iter()
        .find(|a| a.is_ipv4())
        .or_else(|| addresses.iter().next())
        .copied()?;

    let name = info
        .get_property_val_str("ty")
        .map(String::from)
        .or_else(|| instance_name(info.get_fullname()).map(String::from));

    Some(ScannedDevice::new(ip.to_string(), name))
}

/// `"ZD420 [abc]._pdl-datastream._tcp.local."` → `"ZD420 [abc]"`.
fn instance_name(fullname: &str) -> Option<&str> {
    fullname
        .strip_suffix(PRINTER_SERVICE)
        .map(|instance| instance.trim_end_matches('.'))
        .filter(|instance| !instance.is_empty())
}
