//! Query executor: one definition in, one scalar or a row stream out.

use std::sync::Arc;
use std::time::Duration;

use vaultmetrics_core::error::QueryError;
use vaultmetrics_core::series::LabelValues;
use vaultmetrics_core::MetricDefinition;

use crate::store::{Cell, DataStore, Row};

/// Label value substituted for SQL `NULL`.
pub const NULL_LABEL: &str = "<null>";

#[derive(Debug)]
pub enum QueryOutput {
    Scalar(u64),
    Labeled(LabeledRows),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledRow {
    pub labels: LabelValues,
    pub count: u64,
}

/// Rows of one labeled query. Consumed once; rows are validated as they
/// are pulled.
#[derive(Debug)]
pub struct LabeledRows {
    width: usize,
    rows: std::vec::IntoIter<Row>,
}

impl Iterator for LabeledRows {
    type Item = Result<LabeledRow, QueryError>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut row = self.rows.next()?;
        if row.len() != self.width {
            return Some(Err(QueryError::ColumnCount {
                expected: self.width,
                actual: row.len(),
            }));
        }
        let count = row.pop().map(to_count).unwrap_or(Ok(0));
        Some(count.map(|count| LabeledRow {
            labels: row.into_iter().map(to_label).collect(),
            count,
        }))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}

pub struct QueryExecutor {
    store: Arc<dyn DataStore>,
    timeout: Duration,
}

impl QueryExecutor {
    pub fn new(store: Arc<dyn DataStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    pub async fn execute(&self, def: &MetricDefinition) -> Result<QueryOutput, QueryError> {
        let sql = def.query.to_sql();
        let rows = tokio::time::timeout(self.timeout, self.store.query(&sql))
            .await
            .map_err(|_| QueryError::Timeout(self.timeout))??;

        if def.is_scalar() {
            // no rows counts as zero
            let value = match rows.into_iter().next() {
                None => 0,
                Some(row) if row.len() != 1 => {
                    return Err(QueryError::ColumnCount {
                        expected: 1,
                        actual: row.len(),
                    })
                }
                Some(mut row) => row.pop().map(to_count).transpose()?.unwrap_or(0),
            };
            return Ok(QueryOutput::Scalar(value));
        }

        Ok(QueryOutput::Labeled(LabeledRows {
            width: def.label_names.len() + 1,
            rows: rows.into_iter(),
        }))
    }
}

fn to_count(cell: Cell) -> Result<u64, QueryError> {
    match cell {
        Cell::Null => Ok(0),
        Cell::Integer(i) => u64::try_from(i).map_err(|_| QueryError::InvalidCount(i.to_string())),
        Cell::Real(f) if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 => {
            Ok(f as u64)
        }
        Cell::Real(f) => Err(QueryError::InvalidCount(f.to_string())),
        Cell::Text(t) => t
            .trim()
            .parse::<u64>()
            .map_err(|_| QueryError::InvalidCount(t)),
        Cell::Blob(_) => Err(QueryError::InvalidCount("blob".into())),
    }
}

fn to_label(cell: Cell) -> String {
    match cell {
        Cell::Null => NULL_LABEL.to_string(),
        Cell::Integer(i) => i.to_string(),
        Cell::Real(f) => f.to_string(),
        Cell::Text(t) => t,
        Cell::Blob(b) => b.iter().map(|byte| format!("{byte:02x}")).collect(),
    }
}
