use std::net::SocketAddr;
use std::time::Duration;

use serde::Deserialize;
use vaultmetrics_core::error::{ExporterError, Result};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExporterConfig {
    pub version: u32,

    #[serde(default)]
    pub exporter: ExporterSection,

    #[serde(default)]
    pub refresh: RefreshSection,

    #[serde(default)]
    pub store: StoreSection,
}

impl ExporterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(ExporterError::Config(format!(
                "unsupported config version: {}",
                self.version
            )));
        }
        self.exporter.validate()?;
        self.refresh.validate()?;
        self.store.validate()?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExporterSection {
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Prepended to every exposed metric name.
    #[serde(default = "default_metric_prefix")]
    pub metric_prefix: String,
}

impl Default for ExporterSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            metric_prefix: default_metric_prefix(),
        }
    }
}

impl ExporterSection {
    pub fn validate(&self) -> Result<()> {
        self.listen_addr()?;
        let prefix_ok = self
            .metric_prefix
            .chars()
            .enumerate()
            .all(|(i, c)| c.is_ascii_alphabetic() || c == '_' || c == ':' || (i > 0 && c.is_ascii_digit()));
        if !prefix_ok {
            return Err(ExporterError::Config(
                "exporter.metric_prefix must match [a-zA-Z_:][a-zA-Z0-9_:]*".into(),
            ));
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.listen.parse().map_err(|_| {
            ExporterError::Config(format!(
                "exporter.listen must be a valid SocketAddr: {}",
                self.listen
            ))
        })
    }
}

fn default_listen() -> String {
    "0.0.0.0:8173".into()
}
fn default_metric_prefix() -> String {
    "bitwarden_rs_database_".into()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RefreshSection {
    /// Minimum seconds between scrape-triggered refreshes.
    #[serde(default = "default_min_interval_secs")]
    pub min_interval_secs: u64,

    #[serde(default = "default_query_timeout_ms")]
    pub query_timeout_ms: u64,

    /// Also refresh on a fixed timer when set.
    #[serde(default)]
    pub background_interval_secs: Option<u64>,
}

impl Default for RefreshSection {
    fn default() -> Self {
        Self {
            min_interval_secs: default_min_interval_secs(),
            query_timeout_ms: default_query_timeout_ms(),
            background_interval_secs: None,
        }
    }
}

impl RefreshSection {
    pub fn validate(&self) -> Result<()> {
        if self.min_interval_secs > 86_400 {
            return Err(ExporterError::Config(
                "refresh.min_interval_secs must be at most 86400".into(),
            ));
        }
        if !(100..=600_000).contains(&self.query_timeout_ms) {
            return Err(ExporterError::Config(
                "refresh.query_timeout_ms must be between 100 and 600000".into(),
            ));
        }
        if self.background_interval_secs == Some(0) {
            return Err(ExporterError::Config(
                "refresh.background_interval_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn min_interval(&self) -> Duration {
        Duration::from_secs(self.min_interval_secs)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    pub fn background_interval(&self) -> Option<Duration> {
        self.background_interval_secs.map(Duration::from_secs)
    }
}

fn default_min_interval_secs() -> u64 {
    10
}
fn default_query_timeout_ms() -> u64 {
    5000
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreSection {
    #[serde(default = "default_store_uri")]
    pub uri: String,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            uri: default_store_uri(),
        }
    }
}

impl StoreSection {
    pub fn validate(&self) -> Result<()> {
        if !self.uri.starts_with("sqlite:") {
            return Err(ExporterError::Config(format!(
                "store.uri must use the sqlite: scheme: {}",
                self.uri
            )));
        }
        Ok(())
    }
}

fn default_store_uri() -> String {
    "sqlite:///db.sqlite3".into()
}
