//! Exporter config loader (strict parsing).

pub mod schema;

use std::fs;

use vaultmetrics_core::error::{ExporterError, Result};

pub use schema::{ExporterConfig, ExporterSection, RefreshSection, StoreSection};

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "VAULTMETRICS_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "vaultmetrics.yaml";

pub fn load_from_file(path: &str) -> Result<ExporterConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| ExporterError::Config(format!("read config {path} failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<ExporterConfig> {
    let cfg: ExporterConfig = serde_yaml::from_str(s)
        .map_err(|e| ExporterError::Config(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}
