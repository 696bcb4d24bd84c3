// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scriptable stand-ins for radios, printers and users, shared by the unit
// tests of this crate.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::watch;

use etikett_bridge::traits::{
    AccessChecker, AccessStatus, ActiveScan, Availability, CandidateFeed, CandidateSelector, PairedDeviceSource,
    PrinterConnection, ScanCallback, ScanEvent, TransportScanner,
};
use etikett_core::error::{EtikettError, Result};
use etikett_core::types::{
    ConnectionKind, DeviceFilter, DiscoveryProgress, PrintPhase, Printer, PrinterState, ScannedDevice,
    TransportType,
};

use crate::connection::ConnectionFactory;
use crate::discovery::{SnapshotStream, TransportDiscoverer};

// -- Scans ------------------------------------------------------------------

/// Counts `stop` calls on the scans it hands out.
struct CountingScan {
    stops: Arc<AtomicUsize>,
    stopped: bool,
}

impl ActiveScan for CountingScan {
    fn stop(&mut self) {
        if !self.stopped {
            self.stopped = true;
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Replays a fixed list of events as soon as a scan starts.
///
/// The callback is kept alive afterwards, like a radio that keeps listening.
pub struct FakeScanner {
    availability: Mutex<Availability>,
    events: Vec<ScanEvent>,
    callbacks: Mutex<Vec<ScanCallback>>,
    starts: AtomicUsize,
    stops: Arc<AtomicUsize>,
}

impl FakeScanner {
    pub fn scripted(events: Vec<ScanEvent>) -> Arc<Self> {
        Arc::new(Self {
            availability: Mutex::new(Availability::Enabled),
            events,
            callbacks: Mutex::new(Vec::new()),
            starts: AtomicUsize::new(0),
            stops: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn with_availability(availability: Availability) -> Arc<Self> {
        let scanner = Self::scripted(Vec::new());
        *scanner.availability.lock().unwrap() = availability;
        scanner
    }

    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl TransportScanner for FakeScanner {
    fn availability(&self) -> Availability {
        *self.availability.lock().unwrap()
    }

    fn start_scan(&self, on_event: ScanCallback) -> Result<Box<dyn ActiveScan>> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        for event in &self.events {
            on_event(event.clone());
        }
        self.callbacks.lock().unwrap().push(on_event);
        Ok(Box::new(CountingScan {
            stops: Arc::clone(&self.stops),
            stopped: false,
        }))
    }
}

/// A paired-device list with scripted service lookups.
pub struct FakePairedSource {
    availability: Mutex<Availability>,
    devices: Vec<ScannedDevice>,
    resolutions: Mutex<Vec<ScanEvent>>,
    lookups: Mutex<Vec<String>>,
    callbacks: Mutex<Vec<ScanCallback>>,
}

impl FakePairedSource {
    pub fn new(devices: Vec<ScannedDevice>) -> Arc<Self> {
        Arc::new(Self {
            availability: Mutex::new(Availability::Enabled),
            devices,
            resolutions: Mutex::new(Vec::new()),
            lookups: Mutex::new(Vec::new()),
            callbacks: Mutex::new(Vec::new()),
        })
    }

    /// Events reported once a service lookup is requested.
    pub fn resolving(self: Arc<Self>, events: Vec<ScanEvent>) -> Arc<Self> {
        self.resolutions.lock().unwrap().extend(events);
        self
    }

    pub fn with_availability(self: Arc<Self>, availability: Availability) -> Arc<Self> {
        *self.availability.lock().unwrap() = availability;
        self
    }

    pub fn requested_lookups(&self) -> Vec<String> {
        self.lookups.lock().unwrap().clone()
    }
}

impl PairedDeviceSource for FakePairedSource {
    fn availability(&self) -> Availability {
        *self.availability.lock().unwrap()
    }

    fn paired_devices(&self) -> Result<Vec<ScannedDevice>> {
        Ok(self.devices.clone())
    }

    fn fetch_services(&self, addresses: &[String], on_event: ScanCallback) -> Result<Box<dyn ActiveScan>> {
        self.lookups.lock().unwrap().extend_from_slice(addresses);
        for event in self.resolutions.lock().unwrap().iter() {
            on_event(event.clone());
        }
        self.callbacks.lock().unwrap().push(on_event);
        Ok(Box::new(CountingScan {
            stops: Arc::new(AtomicUsize::new(0)),
            stopped: false,
        }))
    }
}

// -- Discoverers ------------------------------------------------------------

/// Sets its flag when dropped.
struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

enum Script {
    Snapshots(Vec<Vec<Printer>>),
    Fail(String),
    Endless(Printer),
}

/// A `TransportDiscoverer` that plays back canned snapshots.
pub struct FakeDiscoverer {
    transport: TransportType,
    script: Script,
    discovers: AtomicUsize,
    dropped: Arc<AtomicBool>,
}

impl FakeDiscoverer {
    fn scripted(transport: TransportType, script: Script) -> Arc<Self> {
        Arc::new(Self {
            transport,
            script,
            discovers: AtomicUsize::new(0),
            dropped: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn new(transport: TransportType, snapshots: Vec<Vec<Printer>>) -> Arc<Self> {
        Self::scripted(transport, Script::Snapshots(snapshots))
    }

    pub fn failing(transport: TransportType, message: &str) -> Arc<Self> {
        Self::scripted(transport, Script::Fail(message.to_owned()))
    }

    /// Yields one snapshot and then never completes.
    pub fn endless(transport: TransportType, printer: Printer) -> Arc<Self> {
        Self::scripted(transport, Script::Endless(printer))
    }

    pub fn discover_count(&self) -> usize {
        self.discovers.load(Ordering::SeqCst)
    }

    pub fn stream_dropped(&self) -> bool {
        self.dropped.load(Ordering::SeqCst)
    }
}

impl TransportDiscoverer for FakeDiscoverer {
    fn transport(&self) -> TransportType {
        self.transport
    }

    fn discover(&self, _filter: Option<DeviceFilter>, _strict: bool) -> SnapshotStream {
        self.discovers.fetch_add(1, Ordering::SeqCst);
        let flag = DropFlag(Arc::clone(&self.dropped));
        let (items, endless): (Vec<Result<Vec<Printer>>>, bool) = match &self.script {
            Script::Snapshots(snapshots) => (snapshots.iter().cloned().map(Ok).collect(), false),
            Script::Fail(message) => (vec![Err(EtikettError::Discovery(message.clone()))], false),
            Script::Endless(printer) => (vec![Ok(vec![printer.clone()])], true),
        };
        Box::pin(stream! {
            let _flag = flag;
            for item in items {
                yield item;
            }
            if endless {
                futures::future::pending::<()>().await;
            }
        })
    }
}

// -- Printers ---------------------------------------------------------------

#[derive(Default)]
struct PrinterLog {
    state: PrinterState,
    failing_opens: usize,
    failing_status_queries: usize,
    failing_writes: usize,
    rejecting_writes: bool,
    failing_closes: bool,
    created: Vec<(String, ConnectionKind)>,
    opens: usize,
    closes: usize,
    status_queries: usize,
    write_attempts: usize,
    written: Vec<Vec<u8>>,
    steps: Vec<&'static str>,
}

/// One physical printer behind every connection the factory creates.
///
/// Failures are scripted as counts: the next `n` calls fail with a
/// connectivity error and drop the link. Status queries and writes yield to
/// the scheduler first, like real I/O.
pub struct ScriptedPrinter {
    log: Arc<Mutex<PrinterLog>>,
}

impl ScriptedPrinter {
    pub fn ready() -> Arc<Self> {
        Self::with_state(PrinterState::default())
    }

    pub fn with_state(state: PrinterState) -> Arc<Self> {
        Arc::new(Self {
            log: Arc::new(Mutex::new(PrinterLog {
                state,
                ..Default::default()
            })),
        })
    }

    fn log(&self) -> std::sync::MutexGuard<'_, PrinterLog> {
        self.log.lock().unwrap()
    }

    pub fn fail_opens(&self, count: usize) {
        self.log().failing_opens = count;
    }

    pub fn fail_status_queries(&self, count: usize) {
        self.log().failing_status_queries = count;
    }

    pub fn fail_writes(&self, count: usize) {
        self.log().failing_writes = count;
    }

    /// Writes fail with a non-connectivity error.
    pub fn reject_writes(&self) {
        self.log().rejecting_writes = true;
    }

    pub fn fail_closes(&self) {
        self.log().failing_closes = true;
    }

    pub fn connections_created(&self) -> usize {
        self.log().created.len()
    }

    pub fn created_for(&self) -> Vec<(String, ConnectionKind)> {
        self.log().created.clone()
    }

    pub fn opens(&self) -> usize {
        self.log().opens
    }

    pub fn closes(&self) -> usize {
        self.log().closes
    }

    pub fn status_queries(&self) -> usize {
        self.log().status_queries
    }

    pub fn write_attempts(&self) -> usize {
        self.log().write_attempts
    }

    pub fn written(&self) -> Vec<Vec<u8>> {
        self.log().written.clone()
    }

    /// `"status"` and `"write"` in the order the printer saw them.
    pub fn steps(&self) -> Vec<&'static str> {
        self.log().steps.clone()
    }
}

impl ConnectionFactory for ScriptedPrinter {
    fn create(&self, address: &str, kind: ConnectionKind) -> Result<Box<dyn PrinterConnection>> {
        self.log().created.push((address.to_owned(), kind));
        Ok(Box::new(ScriptedConnection {
            log: Arc::clone(&self.log),
            open: false,
        }))
    }
}

struct ScriptedConnection {
    log: Arc<Mutex<PrinterLog>>,
    open: bool,
}

fn take_failure(remaining: &mut usize) -> bool {
    if *remaining > 0 {
        *remaining -= 1;
        true
    } else {
        false
    }
}

#[async_trait]
impl PrinterConnection for ScriptedConnection {
    async fn open(&mut self) -> Result<()> {
        let mut log = self.log.lock().unwrap();
        if take_failure(&mut log.failing_opens) {
            return Err(EtikettError::Connection("connection refused".into()));
        }
        log.opens += 1;
        self.open = true;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    async fn close(&mut self) -> Result<()> {
        let mut log = self.log.lock().unwrap();
        if self.open {
            self.open = false;
            log.closes += 1;
        }
        if log.failing_closes {
            return Err(EtikettError::Connection("socket already gone".into()));
        }
        Ok(())
    }

    async fn write(&mut self, data: &[u8]) -> Result<()> {
        tokio::task::yield_now().await;
        let mut log = self.log.lock().unwrap();
        log.write_attempts += 1;
        log.steps.push("write");
        if !self.open {
            return Err(EtikettError::Connection("not connected".into()));
        }
        if log.rejecting_writes {
            return Err(EtikettError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "payload rejected",
            )));
        }
        if take_failure(&mut log.failing_writes) {
            self.open = false;
            return Err(EtikettError::Connection("broken pipe".into()));
        }
        log.written.push(data.to_vec());
        Ok(())
    }

    async fn query_status(&mut self) -> Result<PrinterState> {
        tokio::task::yield_now().await;
        let mut log = self.log.lock().unwrap();
        log.status_queries += 1;
        log.steps.push("status");
        if !self.open {
            return Err(EtikettError::Connection("not connected".into()));
        }
        if take_failure(&mut log.failing_status_queries) {
            self.open = false;
            return Err(EtikettError::Connection("status reply timed out".into()));
        }
        Ok(log.state)
    }
}

// -- Users ------------------------------------------------------------------

enum Choice {
    FirstOffered,
    Cancel,
    Dismiss,
    Address(String),
}

/// A user picking from the candidate list.
pub struct FakeSelector {
    choice: Choice,
    calls: AtomicUsize,
    completed: AtomicUsize,
    seen: Mutex<Vec<DiscoveryProgress>>,
    phases: Mutex<Option<watch::Receiver<PrintPhase>>>,
    phases_seen: Mutex<Vec<PrintPhase>>,
}

impl FakeSelector {
    fn choosing_by(choice: Choice) -> Arc<Self> {
        Arc::new(Self {
            choice,
            calls: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
            phases: Mutex::new(None),
            phases_seen: Mutex::new(Vec::new()),
        })
    }

    /// Picks the first printer that shows up.
    pub fn first_offered() -> Arc<Self> {
        Self::choosing_by(Choice::FirstOffered)
    }

    /// Watches the whole session, then dismisses the list.
    pub fn cancelling() -> Arc<Self> {
        Self::choosing_by(Choice::Cancel)
    }

    /// Dismisses the list as soon as the first update arrives.
    pub fn dismissing() -> Arc<Self> {
        Self::choosing_by(Choice::Dismiss)
    }

    pub fn choosing(address: &str) -> Arc<Self> {
        Self::choosing_by(Choice::Address(address.to_owned()))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Selections that ran to the end rather than being abandoned.
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<DiscoveryProgress> {
        self.seen.lock().unwrap().clone()
    }

    /// Record the orchestrator phase with every update from now on.
    pub fn watch_phases(&self, phases: watch::Receiver<PrintPhase>) {
        *self.phases.lock().unwrap() = Some(phases);
    }

    pub fn phases_seen(&self) -> Vec<PrintPhase> {
        self.phases_seen.lock().unwrap().clone()
    }

    fn pick(&self, progress: &DiscoveryProgress) -> Option<Printer> {
        match &self.choice {
            Choice::FirstOffered => progress.printers.first().cloned(),
            Choice::Cancel | Choice::Dismiss => None,
            Choice::Address(address) => progress.printers.iter().find(|p| &p.address == address).cloned(),
        }
    }
}

#[async_trait]
impl CandidateSelector for FakeSelector {
    async fn select(&self, mut feed: CandidateFeed) -> Result<Option<Printer>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut chosen = None;
        while let Some(progress) = feed.next().await {
            chosen = self.pick(&progress);
            if let Some(phases) = self.phases.lock().unwrap().as_ref() {
                self.phases_seen.lock().unwrap().push(*phases.borrow());
            }
            self.seen.lock().unwrap().push(progress);
            if chosen.is_some() || matches!(self.choice, Choice::Dismiss) {
                break;
            }
        }
        self.completed.fetch_add(1, Ordering::SeqCst);
        Ok(chosen)
    }
}

pub struct FakeAccess {
    missing: Vec<String>,
}

impl FakeAccess {
    pub fn granted() -> Arc<Self> {
        Arc::new(Self { missing: Vec::new() })
    }

    pub fn missing(rights: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            missing: rights.iter().map(|r| r.to_string()).collect(),
        })
    }
}

impl AccessChecker for FakeAccess {
    fn check_required(&self) -> AccessStatus {
        if self.missing.is_empty() {
            AccessStatus::Granted
        } else {
            AccessStatus::Missing(self.missing.clone())
        }
    }
}
