//! vaultmetrics exporter library entry.
//!
//! Wires the data store, query executor, refresh engine, and scrape
//! service behind an axum router. Consumed by the binary (`main.rs`) and by
//! integration tests.

pub mod app_state;
pub mod catalog;
pub mod config;
pub mod executor;
pub mod ops;
pub mod refresh;
pub mod router;
pub mod scrape;
pub mod store;
