//! Scrape service: count the request, refresh if due, render.
//!
//! Transport-independent; the axum handler in `ops` is a thin wrapper.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use vaultmetrics_core::exposition::{self, ProcessSeries};

use crate::refresh::{RefreshEngine, RefreshPolicy};

pub struct ScrapeService {
    engine: Arc<RefreshEngine>,
    policy: RefreshPolicy,
    prefix: String,
    requests: AtomicU64,
}

impl ScrapeService {
    pub fn new(engine: Arc<RefreshEngine>, policy: RefreshPolicy, prefix: impl Into<String>) -> Self {
        Self {
            engine,
            policy,
            prefix: prefix.into(),
            requests: AtomicU64::new(0),
        }
    }

    /// Serve one scrape. Never fails: a failed or skipped refresh just
    /// means the previous values are served.
    pub async fn scrape(&self) -> String {
        self.requests.fetch_add(1, Ordering::Relaxed);

        if let Some(report) = self.engine.refresh_if_due(&self.policy).await {
            tracing::debug!(seq = report.seq, clean = report.is_clean(), "scrape triggered refresh");
        }
        self.render()
    }

    /// Render current values without considering a refresh.
    pub fn render(&self) -> String {
        let status = self.engine.status();
        let process = ProcessSeries {
            refresh_count: status.refresh_count,
            last_refresh_unix: status.last_refresh_unix.unwrap_or(0.0),
            request_count: self.requests.load(Ordering::Relaxed),
        };
        exposition::render(self.engine.registry(), &self.prefix, &process)
    }

    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    pub fn engine(&self) -> &Arc<RefreshEngine> {
        &self.engine
    }

    pub fn policy(&self) -> &RefreshPolicy {
        &self.policy
    }
}
