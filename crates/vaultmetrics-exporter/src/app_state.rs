//! Shared application state for the exporter.
//!
//! Startup errors are explicit (`Result` instead of panic) so `main` can
//! map them to an exit code.

use std::sync::Arc;

use vaultmetrics_core::error::{ExporterError, Result};
use vaultmetrics_core::{MetricDefinition, Registry};

use crate::config::ExporterConfig;
use crate::executor::QueryExecutor;
use crate::refresh::{RefreshEngine, RefreshPolicy};
use crate::scrape::ScrapeService;
use crate::store::{DataStore, SqliteStore};

#[derive(Clone)]
pub struct AppState {
    cfg: Arc<ExporterConfig>,
    scrape: Arc<ScrapeService>,
}

impl AppState {
    /// Open the configured store, check it answers, and wire the state.
    pub async fn connect(cfg: ExporterConfig, catalog: Vec<MetricDefinition>) -> Result<Self> {
        let store = SqliteStore::open(&cfg.store.uri)?;
        store
            .ping()
            .await
            .map_err(|e| ExporterError::Startup(format!("data store unreachable: {e}")))?;
        Self::new(cfg, catalog, Arc::new(store))
    }

    /// Build state over an already opened store.
    pub fn new(cfg: ExporterConfig, catalog: Vec<MetricDefinition>, store: Arc<dyn DataStore>) -> Result<Self> {
        let registry = Arc::new(Registry::register(catalog)?);
        let executor = QueryExecutor::new(store, cfg.refresh.query_timeout());
        let engine = Arc::new(RefreshEngine::new(registry, executor));
        let policy = RefreshPolicy::new(cfg.refresh.min_interval());
        let scrape = Arc::new(ScrapeService::new(
            engine,
            policy,
            cfg.exporter.metric_prefix.clone(),
        ));

        Ok(Self {
            cfg: Arc::new(cfg),
            scrape,
        })
    }

    pub fn cfg(&self) -> &ExporterConfig {
        &self.cfg
    }

    pub fn scrape(&self) -> Arc<ScrapeService> {
        Arc::clone(&self.scrape)
    }

    pub fn engine(&self) -> Arc<RefreshEngine> {
        Arc::clone(self.scrape.engine())
    }
}
