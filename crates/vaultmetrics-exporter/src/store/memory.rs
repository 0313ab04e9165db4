//! In-memory store with canned results keyed by SQL text.
//!
//! Used by tests and for dry runs; it counts executions so callers can
//! check how much work actually reached the store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use vaultmetrics_core::error::QueryError;
use vaultmetrics_core::MetricDefinition;

use super::{Cell, DataStore, Row};

#[derive(Default)]
pub struct MemoryStore {
    results: Mutex<HashMap<String, Result<Vec<Row>, String>>>,
    executed: AtomicU64,
    latency: Duration,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every query sleeps this long before answering.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    pub fn set_rows(&self, sql: impl Into<String>, rows: Vec<Row>) {
        self.lock().insert(sql.into(), Ok(rows));
    }

    pub fn set_failure(&self, sql: impl Into<String>, msg: impl Into<String>) {
        self.lock().insert(sql.into(), Err(msg.into()));
    }

    /// Canned single-value answer for a scalar definition.
    pub fn respond_scalar(&self, def: &MetricDefinition, count: i64) {
        self.set_rows(def.query.to_sql(), vec![vec![Cell::Integer(count)]]);
    }

    /// Canned rows for a labeled definition: label texts then the count.
    pub fn respond_labeled(&self, def: &MetricDefinition, rows: &[(&[&str], i64)]) {
        let rows = rows
            .iter()
            .map(|(labels, count)| {
                let mut row: Row = labels.iter().map(|l| Cell::Text(l.to_string())).collect();
                row.push(Cell::Integer(*count));
                row
            })
            .collect();
        self.set_rows(def.query.to_sql(), rows);
    }

    pub fn fail(&self, def: &MetricDefinition, msg: impl Into<String>) {
        self.set_failure(def.query.to_sql(), msg);
    }

    /// Number of queries executed so far.
    pub fn executed(&self) -> u64 {
        self.executed.load(Ordering::Relaxed)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Result<Vec<Row>, String>>> {
        self.results.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl DataStore for MemoryStore {
    async fn query(&self, sql: &str) -> Result<Vec<Row>, QueryError> {
        self.executed.fetch_add(1, Ordering::Relaxed);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        match self.lock().get(sql) {
            Some(Ok(rows)) => Ok(rows.clone()),
            Some(Err(msg)) => Err(QueryError::Store(msg.clone())),
            None => Err(QueryError::Store(format!("no such query: {sql}"))),
        }
    }

    async fn ping(&self) -> Result<(), QueryError> {
        Ok(())
    }
}
