// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Selected-printer persistence.
//
// `SqliteSelectionStore` keeps the last printer the user chose in a
// single-row SQLite table so it survives restarts. `MemorySelectionStore`
// is the process-lifetime variant. Both publish every change on a watch
// channel so front ends can follow the selection.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use futures::StreamExt;
use futures::stream::BoxStream;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Deserialize;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, info, instrument};

use etikett_bridge::traits::SelectionStore;
use etikett_core::error::{EtikettError, Result};
use etikett_core::types::{Printer, TransportType};

const CREATE_TABLE_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS selected_printer (
        id INTEGER PRIMARY KEY CHECK (id = 1),
        address TEXT NOT NULL,
        friendly_name TEXT,
        type_id TEXT NOT NULL,
        saved_at TEXT NOT NULL
    )
"#;

const UPSERT_SQL: &str = r#"
    INSERT INTO selected_printer (id, address, friendly_name, type_id, saved_at)
    VALUES (1, ?1, ?2, ?3, ?4)
    ON CONFLICT(id) DO UPDATE SET
        address = excluded.address,
        friendly_name = excluded.friendly_name,
        type_id = excluded.type_id,
        saved_at = excluded.saved_at
"#;

/// Selection store backed by a SQLite database.
///
/// `rusqlite` is synchronous; every statement here touches one row, so the
/// calls run inline on the async task.
pub struct SqliteSelectionStore {
    conn: Mutex<Connection>,
    changes: watch::Sender<Option<Printer>>,
}

impl SqliteSelectionStore {
    /// Open (or create) the selection database at the given path.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .map_err(|e| EtikettError::Database(format!("open: {e}")))?;
        let store = Self::from_connection(conn)?;
        info!("selection database opened");
        Ok(store)
    }

    /// Open an in-memory database (useful for tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| EtikettError::Database(format!("open in-memory: {e}")))?;
        let store = Self::from_connection(conn)?;
        debug!("in-memory selection database opened");
        Ok(store)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(CREATE_TABLE_SQL)
            .map_err(|e| EtikettError::Database(format!("create table: {e}")))?;
        let current = read_selection(&conn)?;
        let (changes, _) = watch::channel(current);
        Ok(Self {
            conn: Mutex::new(conn),
            changes,
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| EtikettError::Database("selection database lock poisoned".into()))
    }

    /// Import a selection saved by the legacy key-value preferences file.
    ///
    /// `legacy_json` is the stored record, e.g.
    /// `{"address":"AC:3F:A4:1D:7A:5C","name":"ZQ520","typeId":"bluetooth"}`.
    /// Nothing is imported when a selection already exists. Returns the
    /// imported printer.
    #[instrument(skip_all)]
    pub fn migrate_from_json(&self, legacy_json: &str) -> Result<Option<Printer>> {
        let legacy: LegacySelection = serde_json::from_str(legacy_json)?;
        let conn = self.lock()?;
        if read_selection(&conn)?.is_some() {
            debug!("selection already present, legacy record ignored");
            return Ok(None);
        }
        let Some(printer) = legacy.into_printer() else {
            debug!("legacy record is empty");
            return Ok(None);
        };
        write_selection(&conn, &printer)?;
        drop(conn);

        info!(address = %printer.address, "migrated legacy selection");
        self.changes.send_replace(Some(printer.clone()));
        Ok(Some(printer))
    }
}

#[async_trait]
impl SelectionStore for SqliteSelectionStore {
    #[instrument(skip_all, fields(address = %printer.address))]
    async fn save(&self, printer: &Printer) -> Result<()> {
        {
            let conn = self.lock()?;
            write_selection(&conn, printer)?;
        }
        debug!("selection saved");
        self.changes.send_replace(Some(printer.clone()));
        Ok(())
    }

    #[instrument(skip(self))]
    async fn load(&self) -> Result<Option<Printer>> {
        let conn = self.lock()?;
        read_selection(&conn)
    }

    fn observe(&self) -> BoxStream<'static, Option<Printer>> {
        WatchStream::new(self.changes.subscribe()).boxed()
    }
}

fn write_selection(conn: &Connection, printer: &Printer) -> Result<()> {
    conn.execute(
        UPSERT_SQL,
        params![
            printer.address,
            printer.friendly_name,
            printer.transport.id(),
            Utc::now().to_rfc3339(),
        ],
    )
    .map_err(|e| EtikettError::Database(format!("save selection: {e}")))?;
    Ok(())
}

/// Rows with an empty address or type read as "no selection".
fn read_selection(conn: &Connection) -> Result<Option<Printer>> {
    let row = conn
        .query_row(
            "SELECT address, friendly_name, type_id FROM selected_printer WHERE id = 1",
            [],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, String>(2)?,
                ))
            },
        )
        .optional()
        .map_err(|e| EtikettError::Database(format!("load selection: {e}")))?;

    Ok(row.and_then(|(address, name, type_id)| {
        selection_from_parts(address, name, &type_id)
    }))
}

fn selection_from_parts(address: String, name: Option<String>, type_id: &str) -> Option<Printer> {
    if address.is_empty() || type_id.is_empty() {
        return None;
    }
    let name = name.filter(|n| !n.is_empty());
    Some(Printer::new(address, name, TransportType::from_id(type_id)))
}

/// Record layout of the legacy preferences entry.
#[derive(Deserialize)]
struct LegacySelection {
    #[serde(default)]
    address: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default, rename = "typeId")]
    type_id: String,
}

impl LegacySelection {
    fn into_printer(self) -> Option<Printer> {
        selection_from_parts(self.address, self.name, &self.type_id)
    }
}

/// Selection store that lives as long as the process.
pub struct MemorySelectionStore {
    changes: watch::Sender<Option<Printer>>,
}

impl MemorySelectionStore {
    pub fn new() -> Self {
        Self::with_selection(None)
    }

    pub fn with_selection(printer: Option<Printer>) -> Self {
        let (changes, _) = watch::channel(printer);
        Self { changes }
    }
}

impl Default for MemorySelectionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SelectionStore for MemorySelectionStore {
    async fn save(&self, printer: &Printer) -> Result<()> {
        self.changes.send_replace(Some(printer.clone()));
        Ok(())
    }

    async fn load(&self) -> Result<Option<Printer>> {
        Ok(self.changes.borrow().clone())
    }

    fn observe(&self) -> BoxStream<'static, Option<Printer>> {
        WatchStream::new(self.changes.subscribe()).boxed()
    }
}
