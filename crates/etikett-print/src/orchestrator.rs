// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Print orchestration.
//
// A print request goes to the stored printer first: probe its state, then
// send. A dropped link gets exactly one forced reconnection per step. When
// the stored printer cannot be used (and the caller did not ask to fail
// fast) the user picks a new printer from a live discovery session, the
// choice is persisted, and the request runs once more against it.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::StreamExt;
use futures::stream::BoxStream;
use tokio::sync::{Mutex, watch};
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, info, warn};

use etikett_bridge::traits::{
    AccessChecker, AccessStatus, CandidateFeed, CandidateSelector, PlatformBridge, SelectionStore, SendAction,
};
use etikett_core::config::EngineConfig;
use etikett_core::error::{EtikettError, Result};
use etikett_core::types::{DiscoveryProgress, PrintPhase, PrintResponse, Printer, TransportType};

use crate::connection::{ConnectionManager, TransportConnectionFactory};
use crate::discovery::DiscoveryAggregator;
use crate::payload::LabelPayload;
use crate::retry::{is_connectivity_failure, with_forced_reconnect};
use crate::status::StatusProbe;

/// Everything the orchestrator talks to.
pub struct Collaborators {
    pub access: Arc<dyn AccessChecker>,
    pub store: Arc<dyn SelectionStore>,
    pub selector: Arc<dyn CandidateSelector>,
    pub discovery: DiscoveryAggregator,
    pub connections: Arc<ConnectionManager>,
}

pub struct PrintOrchestrator {
    config: EngineConfig,
    access: Arc<dyn AccessChecker>,
    store: Arc<dyn SelectionStore>,
    selector: Arc<dyn CandidateSelector>,
    discovery: DiscoveryAggregator,
    connections: Arc<ConnectionManager>,
    probe: StatusProbe,
    /// Serializes print and search sessions.
    session: Mutex<()>,
    phase: watch::Sender<PrintPhase>,
}

impl PrintOrchestrator {
    pub fn new(config: EngineConfig, collaborators: Collaborators) -> Self {
        let (phase, _) = watch::channel(PrintPhase::Idle);
        Self {
            config,
            access: collaborators.access,
            store: collaborators.store,
            selector: collaborators.selector,
            discovery: collaborators.discovery,
            probe: StatusProbe::new(Arc::clone(&collaborators.connections)),
            connections: collaborators.connections,
            session: Mutex::new(()),
            phase,
        }
    }

    /// Wire the engine to a platform bridge: its radios and access checks,
    /// mDNS for the network, raw TCP for network connections.
    pub fn for_platform(
        config: EngineConfig,
        bridge: &dyn PlatformBridge,
        store: Arc<dyn SelectionStore>,
        selector: Arc<dyn CandidateSelector>,
    ) -> Self {
        let factory = TransportConnectionFactory::new(bridge.radio_connector(), &config);
        let collaborators = Collaborators {
            access: bridge.access_checker(),
            store,
            selector,
            discovery: DiscoveryAggregator::for_platform(bridge, &config),
            connections: Arc::new(ConnectionManager::new(Arc::new(factory))),
        };
        Self::new(config, collaborators)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Current phase of the orchestration state machine, and its changes.
    pub fn phases(&self) -> watch::Receiver<PrintPhase> {
        self.phase.subscribe()
    }

    /// The stored selection first, then every change to it.
    pub fn selected_printer(&self) -> BoxStream<'static, Option<Printer>> {
        self.store.observe()
    }

    pub async fn load_selected_printer(&self) -> Result<Option<Printer>> {
        self.store.load().await
    }

    /// Close the live printer connection, if any.
    pub async fn close_connections(&self) {
        self.connections.close_connections().await;
    }

    pub async fn print_zpl(&self, zpl: &str, fail_on_errors: bool) -> Result<PrintResponse> {
        self.print(&LabelPayload::Zpl(zpl.to_owned()), fail_on_errors).await
    }

    pub async fn print_bytes(&self, bytes: &[u8], fail_on_errors: bool) -> Result<PrintResponse> {
        self.print(&LabelPayload::Bytes(bytes.to_vec()), fail_on_errors).await
    }

    pub async fn print_stored_format(
        &self,
        name: &str,
        fields: BTreeMap<u32, String>,
        fail_on_errors: bool,
    ) -> Result<PrintResponse> {
        self.print(&LabelPayload::stored_format(name, fields), fail_on_errors).await
    }

    /// Print `action` on the stored printer, falling back to interactive
    /// reselection unless `fail_on_errors` is set.
    pub async fn print(&self, action: &dyn SendAction, fail_on_errors: bool) -> Result<PrintResponse> {
        let _session = self.session.lock().await;
        let outcome = self.run_print(action, fail_on_errors).await;
        self.finish(&outcome);
        outcome
    }

    /// Let the user pick a printer from a discovery session and store it.
    pub async fn search_printer_and_save(&self) -> Result<Printer> {
        let _session = self.session.lock().await;
        let outcome = self.run_search_and_save().await;
        self.finish(&outcome);
        outcome
    }

    async fn run_print(&self, action: &dyn SendAction, fail_on_errors: bool) -> Result<PrintResponse> {
        self.set_phase(PrintPhase::Loading);
        self.check_access()?;

        let Some(printer) = self.store.load().await? else {
            if fail_on_errors {
                return Err(EtikettError::PrinterNotSelected);
            }
            info!("no printer selected, starting discovery");
            return self.reselect_then_print(action).await;
        };

        info!(printer = %printer, fail_on_errors, "printing on stored printer");
        match self.probe_then_print(&printer, action).await {
            Ok(response) => Ok(response),
            Err(e) => self.recover(e, action, fail_on_errors).await,
        }
    }

    /// Decide what a failure on the stored printer leads to.
    async fn recover(&self, err: EtikettError, action: &dyn SendAction, fail_on_errors: bool) -> Result<PrintResponse> {
        match err {
            EtikettError::PrinterNotReadyToPrint(_) if fail_on_errors || !self.config.reselect_when_not_ready => {
                Err(err)
            }
            err if is_connectivity_failure(&err) && fail_on_errors => {
                warn!(error = %err, "stored printer unreachable");
                Err(EtikettError::PrinterNotReachable)
            }
            err if fail_on_errors => Err(err),
            err => {
                info!(error = %err, "stored printer failed, starting discovery");
                self.reselect_then_print(action).await
            }
        }
    }

    async fn reselect_then_print(&self, action: &dyn SendAction) -> Result<PrintResponse> {
        let printer = self.persist_new_selection().await?;
        self.probe_then_print(&printer, action).await
    }

    async fn run_search_and_save(&self) -> Result<Printer> {
        self.set_phase(PrintPhase::Loading);
        self.check_access()?;
        self.persist_new_selection().await
    }

    async fn persist_new_selection(&self) -> Result<Printer> {
        let printer = self.select_from_discovery().await?;
        self.set_phase(PrintPhase::Persisting);
        self.store.save(&printer).await?;
        info!(printer = %printer, "selection saved");
        Ok(printer)
    }

    /// Run discovery and hand the live candidate list to the selector.
    ///
    /// Discovery keeps running while the selector waits. A failed discovery
    /// session abandons the pending selection; a finished selection stops
    /// discovery when this returns.
    async fn select_from_discovery(&self) -> Result<Printer> {
        self.set_phase(PrintPhase::Discovering);
        let mut session = self.discovery.discover_printers(
            None,
            self.config.strict_generic_filtering,
            &self.config.transports,
        );

        let (progress_tx, progress_rx) = watch::channel(DiscoveryProgress::default());
        let feed: CandidateFeed = WatchStream::from_changes(progress_rx).boxed();

        let pump = async move {
            while let Some(update) = session.next().await {
                progress_tx.send_replace(update?);
            }
            Ok::<(), EtikettError>(())
        };
        let selection = self.selector.select(feed);
        tokio::pin!(pump);
        tokio::pin!(selection);

        let mut discovering = true;
        let chosen = loop {
            tokio::select! {
                chosen = &mut selection => break chosen?,
                pumped = &mut pump, if discovering => {
                    discovering = false;
                    match pumped {
                        Ok(()) => self.set_phase(PrintPhase::Selecting),
                        Err(e) => {
                            warn!(error = %e, "discovery failed, abandoning selection");
                            return Err(e);
                        }
                    }
                }
            }
        };

        match chosen {
            Some(printer) => {
                info!(printer = %printer, "printer selected");
                Ok(printer)
            }
            None => {
                info!("printer selection cancelled");
                Err(EtikettError::DiscoveryCancelled)
            }
        }
    }

    /// Probe, then send, each with one forced reconnection on a dropped link.
    async fn probe_then_print(&self, printer: &Printer, action: &dyn SendAction) -> Result<PrintResponse> {
        let address = printer.address.as_str();
        let transport = Some(printer.transport);

        self.set_phase(PrintPhase::Probing);
        let state = with_forced_reconnect("status probe", move |force| {
            self.probe.probe(address, transport, force)
        })
        .await?;
        if !state.is_ready_to_print() {
            warn!(%address, %state, "printer not ready");
            return Err(EtikettError::PrinterNotReadyToPrint(state));
        }

        self.set_phase(PrintPhase::Printing);
        with_forced_reconnect("send", move |force| self.send_once(address, transport, action, force))
            .await
            .map_err(|e| match e {
                e if is_connectivity_failure(&e) => e,
                EtikettError::Print(message) => EtikettError::Print(message),
                other => EtikettError::Print(other.to_string()),
            })?;

        info!(%address, "label sent");
        Ok(PrintResponse {
            printer_name: printer.friendly_name.clone(),
            printer_address: printer.address.clone(),
        })
    }

    async fn send_once(
        &self,
        address: &str,
        transport: Option<TransportType>,
        action: &dyn SendAction,
        force_reconnection: bool,
    ) -> Result<()> {
        let handle = self
            .connections
            .get_connection(address, transport, force_reconnection)
            .await?;
        let mut connection = handle.lock().await;
        action.send(&mut **connection).await
    }

    fn check_access(&self) -> Result<()> {
        match self.access.check_required() {
            AccessStatus::Granted => Ok(()),
            AccessStatus::Missing(missing) => {
                warn!(?missing, "access rights missing");
                Err(EtikettError::AccessRequired(missing))
            }
        }
    }

    fn set_phase(&self, phase: PrintPhase) {
        debug!(?phase, "orchestrator phase");
        self.phase.send_replace(phase);
    }

    fn finish<T>(&self, outcome: &Result<T>) {
        match outcome {
            Ok(_) => self.set_phase(PrintPhase::Succeeded),
            Err(e) => {
                warn!(error = %e, "print session failed");
                self.set_phase(PrintPhase::Failed);
            }
        }
    }
}
