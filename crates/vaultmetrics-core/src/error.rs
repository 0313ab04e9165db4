//! Shared error types across vaultmetrics crates.

use std::time::Duration;

use thiserror::Error;

/// Shared result type.
pub type Result<T> = std::result::Result<T, ExporterError>;

/// Process-level errors. Everything here except `Query` is fatal at startup.
#[derive(Debug, Error)]
pub enum ExporterError {
    #[error("invalid config: {0}")]
    Config(String),
    #[error("startup failed: {0}")]
    Startup(String),
    #[error("duplicate metric name: {0}")]
    DuplicateName(String),
    #[error("invalid shape for metric {metric}: {reason}")]
    InvalidShape { metric: String, reason: String },
    #[error(transparent)]
    Query(#[from] QueryError),
}

impl ExporterError {
    pub(crate) fn shape(metric: &str, reason: impl Into<String>) -> Self {
        ExporterError::InvalidShape {
            metric: metric.to_string(),
            reason: reason.into(),
        }
    }

    /// Map the error to a stable process exit code (never 0).
    pub fn exit_code(&self) -> u8 {
        match self {
            ExporterError::Config(_) => 2,
            ExporterError::Startup(_) => 3,
            ExporterError::DuplicateName(_) | ExporterError::InvalidShape { .. } => 4,
            ExporterError::Query(_) => 5,
        }
    }
}

/// Failure of a single metric's query. Scoped to that metric; a refresh
/// records it and moves on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("data store error: {0}")]
    Store(String),
    #[error("query timed out after {0:?}")]
    Timeout(Duration),
    #[error("expected {expected} columns, got {actual}")]
    ColumnCount { expected: usize, actual: usize },
    #[error("count column is not a non-negative integer: {0}")]
    InvalidCount(String),
}
