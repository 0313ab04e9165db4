//! vaultmetrics core: metric definitions, the registry of exposed series,
//! text exposition, and the shared error surface.
//!
//! Nothing here performs I/O or depends on a runtime; the exporter crate
//! supplies the data store, scheduling, and HTTP transport.
//!
//! Panics, `unwrap`, and `expect` are compile-denied here so a malformed
//! query result can never take the process down.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod definition;
pub mod error;
pub mod exposition;
pub mod registry;
pub mod series;

pub use definition::{AggregateQuery, MetricDefinition, MetricKind};
pub use error::{ExporterError, QueryError, Result};
pub use registry::Registry;
pub use series::ExposedSeries;
