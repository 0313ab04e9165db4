//! Data store boundary.
//!
//! The exporter only ever runs read-only aggregate queries, so the trait is
//! a single "run this SQL, give me rows" call plus a startup ping.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;

use vaultmetrics_core::error::QueryError;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// One result cell, detached from the driver.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

pub type Row = Vec<Cell>;

#[async_trait]
pub trait DataStore: Send + Sync {
    /// Execute one read-only query and return every row.
    async fn query(&self, sql: &str) -> Result<Vec<Row>, QueryError>;

    /// Cheap connectivity check, run once at startup.
    async fn ping(&self) -> Result<(), QueryError>;
}
