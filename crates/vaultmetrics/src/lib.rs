//! Top-level facade crate for vaultmetrics.
//!
//! Re-exports the core types and the exporter library so users can depend on a single crate.

pub mod core {
    pub use vaultmetrics_core::*;
}

pub mod exporter {
    pub use vaultmetrics_exporter::*;
}
