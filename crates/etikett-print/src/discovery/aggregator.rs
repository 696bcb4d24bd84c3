// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Combines the enabled transport discoverers into one progressive session.
//
// Sequential mode walks the transports in priority order so only one radio
// scans at a time. Concurrent mode runs them all and re-emits the union of
// each transport's latest snapshot on every update. Either way a session
// that ends with no printers fails with `NoPrinterFound`.

use std::sync::Arc;

use async_stream::{stream, try_stream};
use futures::stream::{BoxStream, select_all};
use futures::{Stream, StreamExt};
use tracing::{debug, info};

use etikett_bridge::traits::PlatformBridge;
use etikett_core::config::{DiscoveryStrategy, EngineConfig};
use etikett_core::error::{EtikettError, Result};
use etikett_core::types::{
    DeviceFilter, DiscoveryProgress, DiscoveryStatus, Printer, ProgressMessage, TransportType,
};

use super::paired::PairedListDiscoverer;
use super::scan::ScanDiscoverer;
use super::snapshot::Snapshot;
use super::TransportDiscoverer;
use crate::mdns::MdnsScanner;

/// Progress of one discovery session. An `Err` item ends the session.
pub type ProgressStream = BoxStream<'static, Result<DiscoveryProgress>>;

pub struct DiscoveryAggregator {
    /// Sorted by transport priority.
    discoverers: Vec<Arc<dyn TransportDiscoverer>>,
    strategy: DiscoveryStrategy,
}

impl DiscoveryAggregator {
    pub fn new(mut discoverers: Vec<Arc<dyn TransportDiscoverer>>, strategy: DiscoveryStrategy) -> Self {
        discoverers.sort_by_key(|d| d.transport());
        Self { discoverers, strategy }
    }

    /// Radio discoverers from the platform bridge plus mDNS network browsing.
    pub fn for_platform(bridge: &dyn PlatformBridge, config: &EngineConfig) -> Self {
        let discoverers: Vec<Arc<dyn TransportDiscoverer>> = vec![
            Arc::new(PairedListDiscoverer::new(bridge.paired_devices(), config.service_fetch_timeout())),
            Arc::new(ScanDiscoverer::broadcast(bridge.broadcast_scanner())),
            Arc::new(ScanDiscoverer::low_energy(bridge.low_energy_scanner())),
            Arc::new(ScanDiscoverer::network(Arc::new(MdnsScanner::new(config.network_browse_window())))),
        ];
        Self::new(discoverers, config.discovery_strategy)
    }

    pub fn strategy(&self) -> DiscoveryStrategy {
        self.strategy
    }

    /// Start a discovery session over `enabled_transports`.
    ///
    /// Nothing scans until the stream is polled. Dropping the stream stops
    /// every scan it started.
    pub fn discover_printers(
        &self,
        filter: Option<DeviceFilter>,
        strict_generic_filtering: bool,
        enabled_transports: &[TransportType],
    ) -> ProgressStream {
        let sources: Vec<_> = self
            .discoverers
            .iter()
            .filter(|d| enabled_transports.contains(&d.transport()))
            .cloned()
            .collect();
        info!(
            strategy = ?self.strategy,
            transports = ?sources.iter().map(|d| d.transport()).collect::<Vec<_>>(),
            "starting printer discovery"
        );
        match self.strategy {
            DiscoveryStrategy::Sequential => Box::pin(sequential(sources, filter, strict_generic_filtering)),
            DiscoveryStrategy::Concurrent => Box::pin(concurrent(sources, filter, strict_generic_filtering)),
        }
    }
}

fn sequential(
    sources: Vec<Arc<dyn TransportDiscoverer>>,
    filter: Option<DeviceFilter>,
    strict_generic_filtering: bool,
) -> impl Stream<Item = Result<DiscoveryProgress>> + Send + 'static {
    try_stream! {
        let mut merged = Snapshot::new();
        yield DiscoveryProgress::new(Vec::new(), Some(ProgressMessage::Starting));

        for source in sources {
            let searching = Some(ProgressMessage::Searching(source.transport()));
            yield DiscoveryProgress::new(merged.to_vec(), searching);

            let mut snapshots = source.discover(filter.clone(), strict_generic_filtering);
            while let Some(snapshot) = snapshots.next().await {
                merged.update_with(snapshot?);
                yield DiscoveryProgress::new(merged.to_vec(), searching);
            }
            debug!(transport = ?source.transport(), total = merged.len(), "transport finished");
        }

        ensure_found(&merged)?;
        yield DiscoveryProgress::new(merged.to_vec(), Some(ProgressMessage::Done));
    }
}

fn concurrent(
    sources: Vec<Arc<dyn TransportDiscoverer>>,
    filter: Option<DeviceFilter>,
    strict_generic_filtering: bool,
) -> impl Stream<Item = Result<DiscoveryProgress>> + Send + 'static {
    try_stream! {
        let mut latest: Vec<Vec<Printer>> = vec![Vec::new(); sources.len()];
        let mut updates = select_all(sources.iter().enumerate().map(|(slot, source)| {
            source
                .discover(filter.clone(), strict_generic_filtering)
                .map(move |snapshot| (slot, snapshot))
                .boxed()
        }));
        let mut merged = Snapshot::new();
        yield DiscoveryProgress::new(Vec::new(), Some(ProgressMessage::SearchingAll));

        while let Some((slot, snapshot)) = updates.next().await {
            latest[slot] = snapshot?;
            merged = Snapshot::union(&latest);
            yield DiscoveryProgress::new(merged.to_vec(), Some(ProgressMessage::SearchingAll));
        }

        ensure_found(&merged)?;
        yield DiscoveryProgress::new(merged.to_vec(), Some(ProgressMessage::Done));
    }
}

fn ensure_found(merged: &Snapshot) -> Result<()> {
    if merged.is_empty() {
        info!("discovery finished without printers");
        return Err(EtikettError::NoPrinterFound);
    }
    info!(found = merged.len(), "discovery finished");
    Ok(())
}

/// Coarse status view of a discovery session.
pub fn discovery_statuses(progress: ProgressStream) -> BoxStream<'static, DiscoveryStatus> {
    Box::pin(stream! {
        let mut progress = progress;
        let mut last = Vec::new();
        let mut failed = false;
        yield DiscoveryStatus::InProgress;

        while let Some(update) = progress.next().await {
            match update {
                Ok(update) => {
                    last = update.printers.clone();
                    yield DiscoveryStatus::Updated(update.printers);
                }
                Err(e) => {
                    yield DiscoveryStatus::Error(e.to_string());
                    failed = true;
                    break;
                }
            }
        }

        if !failed {
            yield DiscoveryStatus::Completed(last);
        }
    })
}
