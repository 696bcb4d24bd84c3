// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Candidate selection on the terminal.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::oneshot;
use tracing::debug;

use etikett_bridge::traits::{CandidateFeed, CandidateSelector};
use etikett_core::error::{EtikettError, Result};
use etikett_core::types::{DiscoveryProgress, Printer};

type LineReader = Arc<dyn Fn() -> io::Result<String> + Send + Sync>;

/// Lists candidates on stderr as discovery finds them and reads the user's
/// choice from stdin. An empty line or `q` dismisses the list.
pub struct TerminalSelector {
    read_line: LineReader,
}

impl TerminalSelector {
    pub fn new() -> Self {
        Self::reading_with(Arc::new(read_stdin_line))
    }

    fn reading_with(read_line: LineReader) -> Self {
        Self { read_line }
    }

    /// Read one line on a detached thread.
    ///
    /// A selection abandoned mid-read leaves the thread blocked on stdin; it
    /// must not hold up runtime shutdown, so it is never joined.
    fn answer(&self) -> Result<oneshot::Receiver<io::Result<String>>> {
        let (tx, rx) = oneshot::channel();
        let read_line = Arc::clone(&self.read_line);
        std::thread::Builder::new()
            .name("etikett-stdin".into())
            .spawn(move || {
                let _ = tx.send(read_line());
            })?;
        Ok(rx)
    }
}

impl Default for TerminalSelector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CandidateSelector for TerminalSelector {
    async fn select(&self, mut feed: CandidateFeed) -> Result<Option<Printer>> {
        let mut candidates: Vec<Printer> = Vec::new();
        let mut feed_open = true;
        let mut answer = self.answer()?;

        eprintln!("Searching for printers. Enter a number to choose, or press Enter to cancel.");
        loop {
            tokio::select! {
                update = feed.next(), if feed_open => match update {
                    Some(progress) => {
                        render(&progress);
                        candidates = progress.printers;
                    }
                    None => feed_open = false,
                },
                line = &mut answer => {
                    let line = line.map_err(|_| EtikettError::Io(io::Error::other("stdin reader stopped")))??;
                    return Ok(parse_choice(&line, &candidates));
                }
            }
        }
    }
}

/// Picks a printer by address once discovery reports it. Lets scripts select
/// a known printer without a terminal.
pub struct AddressSelector {
    address: String,
}

impl AddressSelector {
    pub fn new(address: impl Into<String>) -> Self {
        Self { address: address.into() }
    }
}

#[async_trait]
impl CandidateSelector for AddressSelector {
    async fn select(&self, mut feed: CandidateFeed) -> Result<Option<Printer>> {
        while let Some(progress) = feed.next().await {
            if let Some(printer) = progress.printers.into_iter().find(|p| p.address == self.address) {
                return Ok(Some(printer));
            }
        }
        debug!(address = %self.address, "requested printer was not discovered");
        Ok(None)
    }
}

fn read_stdin_line() -> io::Result<String> {
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line)
}

fn render(progress: &DiscoveryProgress) {
    let mut err = io::stderr().lock();
    let status = progress.message.map(|m| m.to_string()).unwrap_or_default();
    let _ = writeln!(err, "-- {status}");
    for (index, printer) in progress.printers.iter().enumerate() {
        let _ = writeln!(err, "  [{}] {}", index + 1, printer);
    }
    let _ = write!(err, "> ");
    let _ = err.flush();
}

/// 1-based index into `candidates`. Anything else cancels.
fn parse_choice(line: &str, candidates: &[Printer]) -> Option<Printer> {
    let choice = line.trim();
    if choice.is_empty() || choice.eq_ignore_ascii_case("q") {
        return None;
    }
    let index: usize = choice.parse().ok()?;
    candidates.get(index.checked_sub(1)?).cloned()
}
