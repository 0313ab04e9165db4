//! SQLite adapter (rusqlite).
//!
//! rusqlite is blocking, so every query runs on the blocking pool. If the
//! caller drops the future (query timeout), the query is cancelled: a
//! progress handler aborts the statement, and a query that has not started
//! yet never runs. The connection does not stay busy behind abandoned work.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};

use vaultmetrics_core::error::{ExporterError, QueryError, Result};

use super::{Cell, DataStore, Row};

/// VM instructions between cancellation checks.
const PROGRESS_OPS: i32 = 1000;

pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open the database behind a `sqlite:` URI.
    ///
    /// - `sqlite:///db.sqlite3`   relative path `db.sqlite3`
    /// - `sqlite:////var/db.sqlite3` absolute path
    /// - `sqlite://` or `sqlite::memory:` in-memory (empty) database
    pub fn open(uri: &str) -> Result<Self> {
        match parse_uri(uri)? {
            None => {
                let conn = Connection::open_in_memory()
                    .map_err(|e| ExporterError::Startup(format!("open in-memory sqlite failed: {e}")))?;
                Ok(Self::from_connection(conn))
            }
            Some(path) => Self::open_path(Path::new(path)),
        }
    }

    /// Open an existing database file read-only. A missing file is an error.
    pub fn open_path(path: &Path) -> Result<Self> {
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY
            | OpenFlags::SQLITE_OPEN_NO_MUTEX
            | OpenFlags::SQLITE_OPEN_URI;
        let conn = Connection::open_with_flags(path, flags).map_err(|e| {
            ExporterError::Startup(format!("open sqlite database {} failed: {e}", path.display()))
        })?;
        Ok(Self::from_connection(conn))
    }

    /// Wrap an already opened connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }
}

/// `None` means in-memory.
fn parse_uri(uri: &str) -> Result<Option<&str>> {
    if uri == "sqlite::memory:" {
        return Ok(None);
    }
    let rest = uri
        .strip_prefix("sqlite://")
        .ok_or_else(|| ExporterError::Config(format!("unsupported store uri: {uri}")))?;
    match rest.strip_prefix('/') {
        Some(path) if !path.is_empty() => Ok(Some(path)),
        _ if rest.is_empty() => Ok(None),
        _ => Err(ExporterError::Config(format!("store uri has no database path: {uri}"))),
    }
}

/// Raises the query's cancel flag unless disarmed first.
struct CancelOnDrop {
    flag: Option<Arc<AtomicBool>>,
}

impl CancelOnDrop {
    fn disarm(mut self) {
        self.flag = None;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if let Some(flag) = self.flag.take() {
            tracing::warn!("sqlite query abandoned; cancelling");
            flag.store(true, Ordering::Relaxed);
        }
    }
}

fn cancelled() -> rusqlite::Error {
    rusqlite::Error::SqliteFailure(
        rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_INTERRUPT),
        Some("query cancelled".into()),
    )
}

fn to_cell(v: ValueRef<'_>) -> Cell {
    match v {
        ValueRef::Null => Cell::Null,
        ValueRef::Integer(i) => Cell::Integer(i),
        ValueRef::Real(f) => Cell::Real(f),
        ValueRef::Text(t) => Cell::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Cell::Blob(b.to_vec()),
    }
}

/// Run `sql` unless cancelled; the progress handler aborts it mid-flight.
fn run_cancellable(conn: &Connection, sql: &str, cancel: Arc<AtomicBool>) -> rusqlite::Result<Vec<Row>> {
    if cancel.load(Ordering::Relaxed) {
        return Err(cancelled());
    }
    conn.progress_handler(PROGRESS_OPS, Some(move || cancel.load(Ordering::Relaxed)));
    let res = run_query(conn, sql);
    conn.progress_handler(0, None::<fn() -> bool>);
    res
}

fn run_query(conn: &Connection, sql: &str) -> rusqlite::Result<Vec<Row>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let width = stmt.column_count();
    let mut rows = stmt.query([])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut cells = Vec::with_capacity(width);
        for i in 0..width {
            cells.push(to_cell(row.get_ref(i)?));
        }
        out.push(cells);
    }
    Ok(out)
}

#[async_trait]
impl DataStore for SqliteStore {
    async fn query(&self, sql: &str) -> std::result::Result<Vec<Row>, QueryError> {
        let conn = Arc::clone(&self.conn);
        let sql = sql.to_string();
        let cancel = Arc::new(AtomicBool::new(false));
        let guard = CancelOnDrop {
            flag: Some(Arc::clone(&cancel)),
        };

        let res = tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap_or_else(PoisonError::into_inner);
            run_cancellable(&conn, &sql, cancel)
        })
        .await;
        guard.disarm();

        match res {
            Ok(rows) => rows.map_err(|e| QueryError::Store(e.to_string())),
            Err(join) => Err(QueryError::Store(format!("query task failed: {join}"))),
        }
    }

    async fn ping(&self) -> std::result::Result<(), QueryError> {
        self.query("SELECT 1").await.map(|_| ())
    }
}
