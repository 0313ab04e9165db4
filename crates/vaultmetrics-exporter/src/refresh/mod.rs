//! Refresh scheduling: the engine, the interval policy, and the optional
//! timer-driven trigger.

pub mod engine;
pub mod policy;
pub mod report;

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior};

pub use engine::{EngineState, RefreshEngine, RefreshStatus};
pub use policy::RefreshPolicy;
pub use report::{MetricOutcome, RefreshReport};

/// Refresh on a fixed period regardless of scrapes. Ticks that land while
/// a refresh is in flight are dropped.
pub fn spawn_background(engine: Arc<RefreshEngine>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // first tick fires immediately; startup already refreshed
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if engine.try_refresh().await.is_none() {
                tracing::debug!("refresh in flight; timer tick dropped");
            }
        }
    })
}
