//! Metric registry: definitions plus the series they expose.
//!
//! Built once at startup. Iteration is in name order so refreshes and
//! renders are deterministic.

use std::collections::{BTreeMap, HashSet};

use crate::definition::{MetricDefinition, MetricKind};
use crate::error::{ExporterError, Result};
use crate::series::ExposedSeries;

struct Entry {
    definition: MetricDefinition,
    series: ExposedSeries,
}

pub struct Registry {
    entries: BTreeMap<&'static str, Entry>,
}

impl Registry {
    /// Validate every definition and allocate its series.
    pub fn register(definitions: impl IntoIterator<Item = MetricDefinition>) -> Result<Self> {
        let mut entries = BTreeMap::new();
        for def in definitions {
            validate(&def)?;
            if entries.contains_key(def.name) {
                return Err(ExporterError::DuplicateName(def.name.to_string()));
            }
            let series = ExposedSeries::new(def.kind);
            entries.insert(def.name, Entry { definition: def, series });
        }
        tracing::debug!(metrics = entries.len(), "registry built");
        Ok(Self { entries })
    }

    pub fn get(&self, name: &str) -> Option<&ExposedSeries> {
        self.entries.get(name).map(|e| &e.series)
    }

    pub fn definition(&self, name: &str) -> Option<&MetricDefinition> {
        self.entries.get(name).map(|e| &e.definition)
    }

    /// All `(definition, series)` pairs in name order.
    pub fn all(&self) -> impl Iterator<Item = (&MetricDefinition, &ExposedSeries)> {
        self.entries.values().map(|e| (&e.definition, &e.series))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn validate(def: &MetricDefinition) -> Result<()> {
    if !is_metric_name(def.name) {
        return Err(ExporterError::shape(def.name, "invalid metric name"));
    }

    match def.kind {
        MetricKind::Scalar => {
            if !def.label_names.is_empty() {
                return Err(ExporterError::shape(def.name, "scalar metric must not declare labels"));
            }
            if def.query.duplicates_only {
                return Err(ExporterError::shape(def.name, "scalar query cannot filter duplicates"));
            }
        }
        MetricKind::Labeled => {
            if def.label_names.is_empty() {
                return Err(ExporterError::shape(def.name, "labeled metric needs at least one label"));
            }
        }
    }

    let expected = def.label_names.len() + 1;
    if def.query.column_count() != expected {
        return Err(ExporterError::shape(
            def.name,
            format!(
                "query yields {} columns, labels require {expected}",
                def.query.column_count()
            ),
        ));
    }

    let mut seen = HashSet::new();
    for label in def.label_names {
        if !is_label_name(label) {
            return Err(ExporterError::shape(def.name, format!("invalid label name: {label}")));
        }
        if !seen.insert(*label) {
            return Err(ExporterError::shape(def.name, format!("repeated label name: {label}")));
        }
    }
    Ok(())
}

/// `[a-zA-Z_:][a-zA-Z0-9_:]*`
pub fn is_metric_name(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

/// `[a-zA-Z_][a-zA-Z0-9_]*`, `__` prefix reserved.
pub fn is_label_name(s: &str) -> bool {
    if s.starts_with("__") {
        return false;
    }
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn name_rules() {
        assert!(is_metric_name("bitwarden_rs_database_users"));
        assert!(is_metric_name("ns:users"));
        assert!(!is_metric_name("1users"));
        assert!(!is_metric_name("users-total"));
        assert!(!is_metric_name(""));

        assert!(is_label_name("user_uuid"));
        assert!(!is_label_name("__name__"));
        assert!(!is_label_name("org:uuid"));
    }
}
