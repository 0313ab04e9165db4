use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde_json::{json, Value};

use vaultmetrics_core::error::QueryError;

/// What happened to one metric during a refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricOutcome {
    pub metric: &'static str,
    /// Number of series lines written, or the captured error.
    pub result: Result<usize, QueryError>,
}

/// Result of one full refresh cycle.
#[derive(Debug, Clone)]
pub struct RefreshReport {
    pub seq: u64,
    pub started_at: SystemTime,
    pub finished_at: SystemTime,
    pub duration: Duration,
    pub outcomes: Vec<MetricOutcome>,
}

impl RefreshReport {
    pub fn outcome(&self, metric: &str) -> Option<&MetricOutcome> {
        self.outcomes.iter().find(|o| o.metric == metric)
    }

    pub fn failures(&self) -> impl Iterator<Item = &MetricOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }

    pub fn is_clean(&self) -> bool {
        self.failures().next().is_none()
    }

    pub fn to_json(&self) -> Value {
        let outcomes: Vec<Value> = self
            .outcomes
            .iter()
            .map(|o| match &o.result {
                Ok(series) => json!({ "metric": o.metric, "ok": true, "series": series }),
                Err(e) => json!({ "metric": o.metric, "ok": false, "error": e.to_string() }),
            })
            .collect();
        json!({
            "seq": self.seq,
            "started_at": unix_secs(self.started_at),
            "finished_at": unix_secs(self.finished_at),
            "duration_ms": self.duration.as_millis() as u64,
            "outcomes": outcomes,
        })
    }
}

pub(crate) fn unix_secs(t: SystemTime) -> f64 {
    t.duration_since(UNIX_EPOCH).map(|d| d.as_secs_f64()).unwrap_or(0.0)
}
