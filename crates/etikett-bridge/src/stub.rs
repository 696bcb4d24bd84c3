// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Stub bridge for desktop/CI builds where no short-range radio stack is wired up.
//
// Radios report themselves absent, so radio discovery fails fast with a
// discovery error and radio connections return `PlatformUnavailable`.
// Network printing does not go through the bridge and keeps working.

use std::sync::Arc;

use etikett_core::error::{EtikettError, Result};
use etikett_core::types::ScannedDevice;

use crate::traits::*;

/// No-radio bridge returned on desktop platforms.
pub struct StubBridge;

impl PlatformBridge for StubBridge {
    fn platform_name(&self) -> &str {
        "Desktop (stub)"
    }

    fn access_checker(&self) -> Arc<dyn AccessChecker> {
        Arc::new(StubRadio)
    }

    fn paired_devices(&self) -> Arc<dyn PairedDeviceSource> {
        Arc::new(StubRadio)
    }

    fn broadcast_scanner(&self) -> Arc<dyn TransportScanner> {
        Arc::new(StubRadio)
    }

    fn low_energy_scanner(&self) -> Arc<dyn TransportScanner> {
        Arc::new(StubRadio)
    }

    fn radio_connector(&self) -> Arc<dyn RadioConnector> {
        Arc::new(StubRadio)
    }
}

/// Absent radio. Desktop processes need no runtime permission grants.
struct StubRadio;

impl AccessChecker for StubRadio {
    fn check_required(&self) -> AccessStatus {
        AccessStatus::Granted
    }
}

impl PairedDeviceSource for StubRadio {
    fn availability(&self) -> Availability {
        Availability::Absent
    }

    fn paired_devices(&self) -> Result<Vec<ScannedDevice>> {
        tracing::warn!("PairedDeviceSource::paired_devices called on stub bridge");
        Err(EtikettError::PlatformUnavailable)
    }

    fn fetch_services(&self, _addresses: &[String], _on_event: ScanCallback) -> Result<Box<dyn ActiveScan>> {
        Err(EtikettError::PlatformUnavailable)
    }
}

impl TransportScanner for StubRadio {
    fn availability(&self) -> Availability {
        Availability::Absent
    }

    fn start_scan(&self, _on_event: ScanCallback) -> Result<Box<dyn ActiveScan>> {
        tracing::warn!("TransportScanner::start_scan called on stub bridge");
        Err(EtikettError::PlatformUnavailable)
    }
}

impl RadioConnector for StubRadio {
    fn classic(&self, address: &str) -> Result<Box<dyn PrinterConnection>> {
        tracing::warn!(%address, "RadioConnector::classic called on stub bridge");
        Err(EtikettError::PlatformUnavailable)
    }

    fn low_energy(&self, address: &str) -> Result<Box<dyn PrinterConnection>> {
        tracing::warn!(%address, "RadioConnector::low_energy called on stub bridge");
        Err(EtikettError::PlatformUnavailable)
    }
}
