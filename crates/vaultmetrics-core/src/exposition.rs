//! Prometheus text exposition (format 0.0.4).
//!
//! Label values are escaped rather than rejected, so any string a query
//! returns can be rendered. Writes into a `String` cannot fail; the
//! `fmt::Result`s are discarded.

use std::fmt::Write;

use crate::definition::MetricDefinition;
use crate::registry::Registry;
use crate::series::ExposedSeries;

/// Content type for the text format.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Process-wide series rendered after the registry.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProcessSeries {
    /// Completed refreshes.
    pub refresh_count: u64,
    /// Unix seconds of the last completed refresh; 0 before the first.
    pub last_refresh_unix: f64,
    /// Scrape requests handled.
    pub request_count: u64,
}

/// Helper to escape label values.
fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

fn escape_help(v: &str) -> String {
    v.replace('\\', "\\\\").replace('\n', "\\n")
}

fn header(out: &mut String, name: &str, help: &str, kind: &str) {
    let _ = writeln!(out, "# HELP {} {}", name, escape_help(help));
    let _ = writeln!(out, "# TYPE {} {}", name, kind);
}

fn label_set(names: &[&str], values: &[String]) -> String {
    names
        .iter()
        .zip(values)
        .map(|(k, v)| format!("{}=\"{}\"", k, escape_label(v)))
        .collect::<Vec<_>>()
        .join(",")
}

/// Render one registered metric as a gauge.
pub fn render_metric(out: &mut String, prefix: &str, def: &MetricDefinition, series: &ExposedSeries) {
    let name = format!("{prefix}{}", def.name);
    header(out, &name, def.description, "gauge");
    match series {
        ExposedSeries::Scalar(_) => {
            let _ = writeln!(out, "{} {}", name, series.value().unwrap_or(0));
        }
        ExposedSeries::Labeled(_) => {
            let Some(snap) = series.snapshot() else { return };
            for (values, count) in snap.iter() {
                let _ = writeln!(out, "{}{{{}}} {}", name, label_set(def.label_names, values), count);
            }
        }
    }
}

/// Render every metric in the registry followed by the process series.
pub fn render(registry: &Registry, prefix: &str, process: &ProcessSeries) -> String {
    let mut out = String::new();
    for (def, series) in registry.all() {
        render_metric(&mut out, prefix, def, series);
    }

    let name = format!("{prefix}readings_count");
    header(&mut out, &name, "Number of updates of readings", "counter");
    let _ = writeln!(out, "{} {}", name, process.refresh_count);

    let name = format!("{prefix}readings_update");
    header(&mut out, &name, "Time for last update of readings", "gauge");
    let _ = writeln!(out, "{} {}", name, process.last_refresh_unix);

    let name = format!("{prefix}request_count");
    header(&mut out, &name, "Number of requests handled", "counter");
    let _ = writeln!(out, "{} {}", name, process.request_count);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_label_values() {
        assert_eq!(escape_label(r#"a"b\c"#), r#"a\"b\\c"#);
        assert_eq!(escape_label("line\nbreak"), "line\\nbreak");
        assert_eq!(escape_help("multi\nline"), "multi\\nline");
    }

    #[test]
    fn label_set_follows_declared_order() {
        let values = vec!["u1".to_string(), "Alice".to_string()];
        assert_eq!(
            label_set(&["user_uuid", "username"], &values),
            r#"user_uuid="u1",username="Alice""#
        );
    }
}
