use tokio::time::{Duration, Instant};

/// Interval gate deciding whether a scrape should pay for a refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshPolicy {
    min_interval: Duration,
}

impl RefreshPolicy {
    pub fn new(min_interval: Duration) -> Self {
        Self { min_interval }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Due when nothing has been refreshed yet or the last refresh
    /// completed at least `min_interval` ago.
    pub fn is_due(&self, last: Option<Instant>, now: Instant) -> bool {
        match last {
            None => true,
            Some(t) => now.saturating_duration_since(t) >= self.min_interval,
        }
    }
}
