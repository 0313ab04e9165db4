//! Refresh engine.
//!
//! Runs every definition through the executor and writes the results into
//! the registry. The refresh path is guarded by one async mutex (the gate),
//! which also holds the monotonic time of the last completed refresh:
//! - scrape path: `refresh_if_due` waits for the gate and re-checks the
//!   policy, so a caller queued behind an in-flight refresh reuses it;
//! - timer path: `try_refresh` drops the tick when the gate is taken;
//! - startup: `refresh` always runs.
//!
//! A cycle runs in its own task that owns the gate guard. Callers only
//! await its handle, so a dropped scrape cannot stop a cycle halfway.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, SystemTime};

use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::Instant;
use tracing::Instrument;

use vaultmetrics_core::error::QueryError;
use vaultmetrics_core::{ExposedSeries, MetricDefinition, Registry};

use super::policy::RefreshPolicy;
use super::report::{unix_secs, MetricOutcome, RefreshReport};
use crate::executor::{QueryExecutor, QueryOutput};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    Idle,
    Refreshing,
}

/// Point-in-time view of the refresh state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RefreshStatus {
    pub refresh_count: u64,
    /// Unix seconds of the last completed refresh, if any.
    pub last_refresh_unix: Option<f64>,
    pub state: EngineState,
}

/// Written once per completed cycle, while the gate is held.
#[derive(Default)]
struct Completed {
    count: u64,
    last_refresh_unix: Option<f64>,
    report: Option<Arc<RefreshReport>>,
}

type Gate = OwnedMutexGuard<Option<Instant>>;

/// Clears the refreshing flag however the cycle ends.
struct RefreshingFlag<'a>(&'a AtomicBool);

impl<'a> RefreshingFlag<'a> {
    fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::Relaxed);
        Self(flag)
    }
}

impl Drop for RefreshingFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

pub struct RefreshEngine {
    registry: Arc<Registry>,
    executor: QueryExecutor,
    gate: Arc<Mutex<Option<Instant>>>,

    started: AtomicU64,
    refreshing: AtomicBool,
    completed: RwLock<Completed>,
}

impl RefreshEngine {
    pub fn new(registry: Arc<Registry>, executor: QueryExecutor) -> Self {
        Self {
            registry,
            executor,
            gate: Arc::new(Mutex::new(None)),
            started: AtomicU64::new(0),
            refreshing: AtomicBool::new(false),
            completed: RwLock::new(Completed::default()),
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Forced refresh. Waits for any in-flight refresh first.
    pub async fn refresh(self: &Arc<Self>) -> Arc<RefreshReport> {
        let gate = Arc::clone(&self.gate).lock_owned().await;
        self.spawn_cycle(gate).await
    }

    /// Scrape path. Returns `None` when the policy says the data is fresh
    /// enough, including when another caller just refreshed it.
    pub async fn refresh_if_due(self: &Arc<Self>, policy: &RefreshPolicy) -> Option<Arc<RefreshReport>> {
        let gate = Arc::clone(&self.gate).lock_owned().await;
        if !policy.is_due(*gate, Instant::now()) {
            return None;
        }
        Some(self.spawn_cycle(gate).await)
    }

    /// Timer path. Returns `None` without waiting if a refresh is running.
    pub async fn try_refresh(self: &Arc<Self>) -> Option<Arc<RefreshReport>> {
        let gate = Arc::clone(&self.gate).try_lock_owned().ok()?;
        Some(self.spawn_cycle(gate).await)
    }

    pub fn status(&self) -> RefreshStatus {
        let completed = self.completed.read().unwrap_or_else(PoisonError::into_inner);
        RefreshStatus {
            refresh_count: completed.count,
            last_refresh_unix: completed.last_refresh_unix,
            state: if self.refreshing.load(Ordering::Relaxed) {
                EngineState::Refreshing
            } else {
                EngineState::Idle
            },
        }
    }

    /// Refresh cycles begun since startup.
    pub fn refreshes_started(&self) -> u64 {
        self.started.load(Ordering::Relaxed)
    }

    pub fn last_report(&self) -> Option<Arc<RefreshReport>> {
        self.completed
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .report
            .clone()
    }

    async fn spawn_cycle(self: &Arc<Self>, mut gate: Gate) -> Arc<RefreshReport> {
        let seq = self.started.fetch_add(1, Ordering::Relaxed) + 1;
        let engine = Arc::clone(self);
        let cycle = tokio::spawn(async move { engine.run(seq, &mut gate).await });

        match cycle.await {
            Ok(report) => report,
            Err(e) => {
                // gate and flag were released when the task unwound
                tracing::error!(seq, error = %e, "refresh task failed");
                let now = SystemTime::now();
                Arc::new(RefreshReport {
                    seq,
                    started_at: now,
                    finished_at: now,
                    duration: Duration::ZERO,
                    outcomes: self
                        .registry
                        .all()
                        .map(|(def, _)| MetricOutcome {
                            metric: def.name,
                            result: Err(QueryError::Store(format!("refresh task failed: {e}"))),
                        })
                        .collect(),
                })
            }
        }
    }

    /// Caller holds the gate; `last` is the guarded slot.
    async fn run(&self, seq: u64, last: &mut Option<Instant>) -> Arc<RefreshReport> {
        let _flag = RefreshingFlag::raise(&self.refreshing);

        let report = self
            .run_all(seq)
            .instrument(tracing::info_span!("refresh", seq))
            .await;

        *last = Some(Instant::now());
        let report = Arc::new(report);
        let mut completed = self.completed.write().unwrap_or_else(PoisonError::into_inner);
        completed.count += 1;
        completed.last_refresh_unix = Some(unix_secs(report.finished_at));
        completed.report = Some(Arc::clone(&report));
        report
    }

    async fn run_all(&self, seq: u64) -> RefreshReport {
        let started_at = SystemTime::now();
        let clock = Instant::now();

        let mut outcomes = Vec::with_capacity(self.registry.len());
        for (def, series) in self.registry.all() {
            let result = self.refresh_one(def, series).await;
            if let Err(e) = &result {
                tracing::warn!(metric = def.name, error = %e, "metric refresh failed; keeping previous value");
            }
            outcomes.push(MetricOutcome { metric: def.name, result });
        }

        let report = RefreshReport {
            seq,
            started_at,
            finished_at: SystemTime::now(),
            duration: clock.elapsed(),
            outcomes,
        };
        tracing::info!(
            metrics = report.outcomes.len(),
            failed = report.failures().count(),
            duration_ms = report.duration.as_millis() as u64,
            "refresh complete"
        );
        report
    }

    async fn refresh_one(&self, def: &MetricDefinition, series: &ExposedSeries) -> Result<usize, QueryError> {
        match self.executor.execute(def).await? {
            QueryOutput::Scalar(v) => {
                series.set(v);
                Ok(1)
            }
            QueryOutput::Labeled(rows) => {
                let map = rows
                    .map(|row| row.map(|r| (r.labels, r.count)))
                    .collect::<Result<BTreeMap<_, _>, _>>()?;
                let n = map.len();
                series.replace(map);
                Ok(n)
            }
        }
    }
}
