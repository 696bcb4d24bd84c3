// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Central service layer. Loads the engine configuration, opens the selection
// database (importing a legacy selection file once), and builds the print
// orchestrator for the current platform.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::stream::BoxStream;
use tracing::{error, info, warn};

use etikett_bridge::traits::{Availability, CandidateSelector, PlatformBridge, SelectionStore};
use etikett_core::config::EngineConfig;
use etikett_core::error::Result;
use etikett_core::types::{DiscoveryStatus, TransportType};
use etikett_print::discovery::{DiscoveryAggregator, discovery_statuses};
use etikett_print::orchestrator::PrintOrchestrator;
use etikett_print::store::{MemorySelectionStore, SqliteSelectionStore};

const CONFIG_FILE: &str = "config.json";
const SELECTION_DB: &str = "selection.db";
/// Selection file written by earlier releases.
const LEGACY_SELECTION_FILE: &str = "selected_printer.json";

/// Everything a command needs, built once at startup.
pub struct AppServices {
    orchestrator: PrintOrchestrator,
    discovery: DiscoveryAggregator,
    config: EngineConfig,
    data_dir: PathBuf,
}

impl AppServices {
    /// Initialise services rooted at `data_dir`.
    ///
    /// Transports the platform has no hardware for are left out of the stored
    /// configuration. `adjust` then applies command-line overrides, which are
    /// taken as given: an explicitly requested transport without hardware
    /// fails discovery with a missing-radio error.
    pub fn init(
        data_dir: PathBuf,
        bridge: &dyn PlatformBridge,
        selector: Arc<dyn CandidateSelector>,
        adjust: impl FnOnce(&mut EngineConfig),
    ) -> Result<Self> {
        info!(path = %data_dir.display(), platform = bridge.platform_name(), "initialising app services");

        let mut config = match load_config(&data_dir) {
            Some(config) => config,
            None => {
                let config = EngineConfig::default();
                if let Err(e) = persist_config(&data_dir, &config) {
                    warn!(error = %e, "could not write default config");
                }
                config
            }
        };
        config.transports = usable_transports(bridge, &config.transports);
        adjust(&mut config);

        let store = open_store(&data_dir);
        let discovery = DiscoveryAggregator::for_platform(bridge, &config);
        let orchestrator = PrintOrchestrator::for_platform(config.clone(), bridge, store, selector);

        info!(transports = ?config.transports, strategy = ?config.discovery_strategy, "app services initialised");
        Ok(Self {
            orchestrator,
            discovery,
            config,
            data_dir,
        })
    }

    pub fn orchestrator(&self) -> &PrintOrchestrator {
        &self.orchestrator
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// A discovery session over the configured transports, as coarse statuses.
    pub fn discover(&self) -> BoxStream<'static, DiscoveryStatus> {
        discovery_statuses(self.discovery.discover_printers(
            None,
            self.config.strict_generic_filtering,
            &self.config.transports,
        ))
    }
}

/// Drop transports whose hardware is absent on this platform.
pub fn usable_transports(bridge: &dyn PlatformBridge, wanted: &[TransportType]) -> Vec<TransportType> {
    wanted
        .iter()
        .copied()
        .filter(|transport| {
            let availability = match transport {
                TransportType::PairedRadio => bridge.paired_devices().availability(),
                TransportType::Broadcast => bridge.broadcast_scanner().availability(),
                TransportType::LowEnergy => bridge.low_energy_scanner().availability(),
                TransportType::Network => Availability::Enabled,
            };
            if availability == Availability::Absent {
                info!(%transport, "no hardware for transport, skipping it");
                return false;
            }
            true
        })
        .collect()
}

/// SQLite selection store, or an in-memory one if the database cannot be
/// opened.
fn open_store(data_dir: &Path) -> Arc<dyn SelectionStore> {
    let store = match SqliteSelectionStore::open(data_dir.join(SELECTION_DB)) {
        Ok(store) => store,
        Err(e) => {
            error!(error = %e, "selection database unavailable, selection will not persist");
            return Arc::new(MemorySelectionStore::new());
        }
    };
    import_legacy_selection(data_dir, &store);
    Arc::new(store)
}

fn import_legacy_selection(data_dir: &Path, store: &SqliteSelectionStore) {
    let path = data_dir.join(LEGACY_SELECTION_FILE);
    let Ok(legacy) = std::fs::read_to_string(&path) else {
        return;
    };
    match store.migrate_from_json(&legacy) {
        Ok(imported) => {
            info!(imported = imported.is_some(), "legacy selection file processed");
            if let Err(e) = std::fs::remove_file(&path) {
                warn!(error = %e, "could not remove legacy selection file");
            }
        }
        Err(e) => warn!(error = %e, "legacy selection file is unreadable, leaving it in place"),
    }
}

// -- Config file persistence -------------------------------------------------

fn load_config(data_dir: &Path) -> Option<EngineConfig> {
    let path = data_dir.join(CONFIG_FILE);
    let data = std::fs::read_to_string(&path).ok()?;
    match serde_json::from_str(&data) {
        Ok(config) => Some(config),
        Err(e) => {
            warn!(error = %e, path = %path.display(), "ignoring malformed config");
            None
        }
    }
}

fn persist_config(data_dir: &Path, config: &EngineConfig) -> Result<()> {
    let path = data_dir.join(CONFIG_FILE);
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(&path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use etikett_bridge::stub::StubBridge;
    use etikett_bridge::traits::CandidateFeed;
    use etikett_core::config::DiscoveryStrategy;
    use etikett_core::error::EtikettError;
    use etikett_core::types::Printer;
    use futures::StreamExt;

    struct NoChoice;

    #[async_trait]
    impl CandidateSelector for NoChoice {
        async fn select(&self, _feed: CandidateFeed) -> Result<Option<Printer>> {
            Ok(None)
        }
    }

    fn init(dir: &Path, adjust: impl FnOnce(&mut EngineConfig)) -> AppServices {
        AppServices::init(dir.to_path_buf(), &StubBridge, Arc::new(NoChoice), adjust).unwrap()
    }

    #[test]
    fn stub_platform_keeps_only_the_network() {
        let usable = usable_transports(&StubBridge, &TransportType::ALL);
        assert_eq!(usable, vec![TransportType::Network]);
    }

    #[tokio::test]
    async fn first_start_writes_default_config() {
        let dir = tempfile::tempdir().unwrap();
        let services = init(dir.path(), |_| {});

        assert_eq!(load_config(dir.path()), Some(EngineConfig::default()));
        assert_eq!(services.config().transports, vec![TransportType::Network]);
    }

    #[tokio::test]
    async fn overrides_apply_on_top_of_stored_config() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), r#"{"tcp_port": 6101}"#).unwrap();

        let services = init(dir.path(), |config| config.discovery_strategy = DiscoveryStrategy::Concurrent);

        assert_eq!(services.config().tcp_port, 6101);
        assert_eq!(services.config().discovery_strategy, DiscoveryStrategy::Concurrent);
        // Overrides are not written back.
        assert_eq!(load_config(dir.path()).unwrap().discovery_strategy, DiscoveryStrategy::Sequential);
    }

    #[tokio::test]
    async fn requested_transport_without_hardware_reports_missing_radio() {
        let dir = tempfile::tempdir().unwrap();
        let services = init(dir.path(), |config| config.transports = vec![TransportType::Broadcast]);
        assert_eq!(services.config().transports, vec![TransportType::Broadcast]);

        let statuses: Vec<_> = services.discover().collect().await;
        let Some(DiscoveryStatus::Error(message)) = statuses.last() else {
            panic!("expected a discovery error, got {statuses:?}");
        };
        assert!(message.contains("no Bluetooth radio"));

        let human = etikett_core::human_errors::humanize_error(&EtikettError::Discovery(message.clone()));
        assert_eq!(human.message, "This device has no Bluetooth radio.");
    }

    #[tokio::test]
    async fn legacy_selection_is_imported_and_removed() {
        let dir = tempfile::tempdir().unwrap();
        let legacy = dir.path().join(LEGACY_SELECTION_FILE);
        std::fs::write(&legacy, r#"{"address":"192.168.1.40","name":"Dock","typeId":"network"}"#).unwrap();

        let services = init(dir.path(), |_| {});

        let selected = services.orchestrator().load_selected_printer().await.unwrap().unwrap();
        assert_eq!(selected.address, "192.168.1.40");
        assert_eq!(selected.transport, TransportType::Network);
        assert!(!legacy.exists());
    }
}
