//! Metric descriptors and the aggregate query model.
//!
//! A definition is plain data: the registry can check every shape in one
//! pass before anything touches the data store.

use std::fmt;

use serde::Serialize;

/// Whether a query yields one number or label-dimensioned rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Scalar,
    Labeled,
}

/// `SELECT [<label columns>,] COUNT(*) FROM <from> [GROUP BY <label columns>] [HAVING COUNT(*) > 1]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateQuery {
    /// Column expressions selected ahead of the count, in label order.
    pub label_columns: &'static [&'static str],
    /// Table expression, joins included.
    pub from: &'static str,
    /// Keep only groups with more than one row.
    pub duplicates_only: bool,
}

impl AggregateQuery {
    /// Plain row count of a table expression.
    pub const fn count(from: &'static str) -> Self {
        Self {
            label_columns: &[],
            from,
            duplicates_only: false,
        }
    }

    /// Row count grouped by the given columns.
    pub const fn grouped(label_columns: &'static [&'static str], from: &'static str) -> Self {
        Self {
            label_columns,
            from,
            duplicates_only: false,
        }
    }

    /// Restrict a grouped query to groups seen more than once.
    pub const fn having_duplicates(mut self) -> Self {
        self.duplicates_only = true;
        self
    }

    /// Number of columns each result row carries (labels + count).
    pub fn column_count(&self) -> usize {
        self.label_columns.len() + 1
    }

    /// Render as SQL text.
    pub fn to_sql(&self) -> String {
        if self.label_columns.is_empty() {
            return format!("SELECT COUNT(*) FROM {}", self.from);
        }
        let cols = self.label_columns.join(", ");
        let mut sql = format!("SELECT {cols}, COUNT(*) FROM {} GROUP BY {cols}", self.from);
        if self.duplicates_only {
            sql.push_str(" HAVING COUNT(*) > 1");
        }
        sql
    }
}

impl fmt::Display for AggregateQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql())
    }
}

/// Immutable descriptor for one exposed metric.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub label_names: &'static [&'static str],
    pub kind: MetricKind,
    pub query: AggregateQuery,
}

impl MetricDefinition {
    pub const fn scalar(name: &'static str, description: &'static str, query: AggregateQuery) -> Self {
        Self {
            name,
            description,
            label_names: &[],
            kind: MetricKind::Scalar,
            query,
        }
    }

    pub const fn labeled(
        name: &'static str,
        description: &'static str,
        label_names: &'static [&'static str],
        query: AggregateQuery,
    ) -> Self {
        Self {
            name,
            description,
            label_names,
            kind: MetricKind::Labeled,
            query,
        }
    }

    pub fn is_scalar(&self) -> bool {
        self.kind == MetricKind::Scalar
    }
}
