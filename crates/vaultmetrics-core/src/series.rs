//! Exposed series: the values a scrape reads.
//!
//! Scalars are a single atomic. Labeled series hold an immutable snapshot
//! behind `RwLock<Arc<..>>`; a refresh builds a whole new map and swaps it
//! in, so a reader sees either the old map or the new one, never a mix.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::definition::MetricKind;

/// Label values in `label_names` order.
pub type LabelValues = Vec<String>;

/// One labeled series' content at a point in time.
pub type LabeledSnapshot = Arc<BTreeMap<LabelValues, u64>>;

#[derive(Debug)]
pub enum ExposedSeries {
    Scalar(AtomicU64),
    Labeled(RwLock<LabeledSnapshot>),
}

impl ExposedSeries {
    pub fn new(kind: MetricKind) -> Self {
        match kind {
            MetricKind::Scalar => ExposedSeries::Scalar(AtomicU64::new(0)),
            MetricKind::Labeled => ExposedSeries::Labeled(RwLock::new(Arc::new(BTreeMap::new()))),
        }
    }

    /// Replace a scalar value. No-op on labeled series.
    pub fn set(&self, v: u64) {
        if let ExposedSeries::Scalar(cell) = self {
            cell.store(v, Ordering::Relaxed);
        }
    }

    /// Swap in a freshly built label map. No-op on scalar series.
    pub fn replace(&self, map: BTreeMap<LabelValues, u64>) {
        if let ExposedSeries::Labeled(slot) = self {
            let mut guard = slot.write().unwrap_or_else(PoisonError::into_inner);
            *guard = Arc::new(map);
        }
    }

    /// Current scalar value (`None` for labeled series).
    pub fn value(&self) -> Option<u64> {
        match self {
            ExposedSeries::Scalar(cell) => Some(cell.load(Ordering::Relaxed)),
            ExposedSeries::Labeled(_) => None,
        }
    }

    /// Current labeled snapshot (`None` for scalar series).
    pub fn snapshot(&self) -> Option<LabeledSnapshot> {
        match self {
            ExposedSeries::Scalar(_) => None,
            ExposedSeries::Labeled(slot) => {
                Some(Arc::clone(&slot.read().unwrap_or_else(PoisonError::into_inner)))
            }
        }
    }

    /// Number of exposition lines this series currently produces.
    pub fn len(&self) -> usize {
        match self {
            ExposedSeries::Scalar(_) => 1,
            ExposedSeries::Labeled(_) => self.snapshot().map(|m| m.len()).unwrap_or(0),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Labeled lookup by label values.
    pub fn get(&self, labels: &[&str]) -> Option<u64> {
        let snap = self.snapshot()?;
        let key: LabelValues = labels.iter().map(|s| s.to_string()).collect();
        snap.get(&key).copied()
    }
}
