//! Refresh engine behavior against the in-memory store.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use vaultmetrics_core::{MetricDefinition, QueryError, Registry};
use vaultmetrics_exporter::catalog;
use vaultmetrics_exporter::executor::QueryExecutor;
use vaultmetrics_exporter::refresh::{EngineState, RefreshEngine};
use vaultmetrics_exporter::store::{Cell, MemoryStore};

fn def(name: &str) -> MetricDefinition {
    catalog::vault()
        .into_iter()
        .find(|d| d.name == name)
        .unwrap_or_else(|| panic!("no catalog entry {name}"))
}

fn engine(store: &Arc<MemoryStore>, names: &[&str]) -> Arc<RefreshEngine> {
    let registry = Registry::register(names.iter().map(|n| def(n))).unwrap();
    Arc::new(RefreshEngine::new(
        Arc::new(registry),
        QueryExecutor::new(store.clone(), Duration::from_secs(5)),
    ))
}

fn labeled_values(engine: &RefreshEngine, name: &str) -> Vec<(Vec<String>, u64)> {
    let snap = engine.registry().get(name).unwrap().snapshot().unwrap();
    snap.iter().map(|(k, v)| (k.clone(), *v)).collect()
}

#[tokio::test]
async fn scalar_value_matches_query() {
    let store = Arc::new(MemoryStore::new());
    store.respond_scalar(&def("users"), 5);
    let engine = engine(&store, &["users"]);

    let report = engine.refresh().await;

    assert!(report.is_clean());
    assert_eq!(report.seq, 1);
    assert_eq!(engine.registry().get("users").unwrap().value(), Some(5));
    assert_eq!(engine.status().refresh_count, 1);
    assert_eq!(engine.status().state, EngineState::Idle);
    assert!(engine.status().last_refresh_unix.is_some());
}

#[tokio::test]
async fn scalar_without_rows_is_zero() {
    let store = Arc::new(MemoryStore::new());
    store.set_rows(def("invitations").query.to_sql(), vec![]);
    let engine = engine(&store, &["invitations"]);

    engine.refresh().await;
    assert_eq!(engine.registry().get("invitations").unwrap().value(), Some(0));
}

#[tokio::test]
async fn labeled_set_matches_query_and_drops_vanished() {
    let store = Arc::new(MemoryStore::new());
    let folders = def("passwords_by_folder");
    store.respond_labeled(&folders, &[(&["f1"], 4), (&["f2"], 1)]);
    let engine = engine(&store, &["passwords_by_folder"]);

    let report = engine.refresh().await;
    assert_eq!(report.outcome("passwords_by_folder").unwrap().result, Ok(2));
    assert_eq!(
        labeled_values(&engine, "passwords_by_folder"),
        vec![(vec!["f1".to_string()], 4), (vec!["f2".to_string()], 1)]
    );

    // folder f1 deleted upstream
    store.respond_labeled(&folders, &[(&["f2"], 3)]);
    engine.refresh().await;
    assert_eq!(
        labeled_values(&engine, "passwords_by_folder"),
        vec![(vec!["f2".to_string()], 3)]
    );
}

#[tokio::test]
async fn refresh_is_idempotent() {
    let store = Arc::new(MemoryStore::new());
    store.respond_scalar(&def("users"), 2);
    store.respond_labeled(
        &def("devices_by_devicename"),
        &[(&["firefox"], 2), (&["android"], 1)],
    );
    let engine = engine(&store, &["users", "devices_by_devicename"]);

    engine.refresh().await;
    let first = labeled_values(&engine, "devices_by_devicename");
    let first_users = engine.registry().get("users").unwrap().value();

    engine.refresh().await;
    assert_eq!(labeled_values(&engine, "devices_by_devicename"), first);
    assert_eq!(engine.registry().get("users").unwrap().value(), first_users);
    assert_eq!(engine.status().refresh_count, 2);
}

#[tokio::test]
async fn failing_metric_keeps_previous_value() {
    let store = Arc::new(MemoryStore::new());
    store.respond_scalar(&def("users"), 5);
    store.respond_scalar(&def("passwords"), 10);
    let engine = engine(&store, &["users", "passwords"]);
    engine.refresh().await;

    store.fail(&def("users"), "database is locked");
    store.respond_scalar(&def("passwords"), 12);
    let report = engine.refresh().await;

    assert_eq!(engine.registry().get("users").unwrap().value(), Some(5));
    assert_eq!(engine.registry().get("passwords").unwrap().value(), Some(12));
    assert_eq!(
        report.outcome("users").unwrap().result,
        Err(QueryError::Store("database is locked".into()))
    );
    assert_eq!(report.failures().count(), 1);
    // the refresh still counts
    assert_eq!(engine.status().refresh_count, 2);
}

#[tokio::test]
async fn bad_row_fails_whole_labeled_metric() {
    let store = Arc::new(MemoryStore::new());
    let folders = def("passwords_by_folder");
    store.respond_labeled(&folders, &[(&["f1"], 4)]);
    let engine = engine(&store, &["passwords_by_folder"]);
    engine.refresh().await;

    store.set_rows(
        folders.query.to_sql(),
        vec![
            vec![Cell::Text("f1".into()), Cell::Integer(5)],
            vec![Cell::Text("f2".into()), Cell::Integer(-1)],
        ],
    );
    let report = engine.refresh().await;

    assert!(matches!(
        report.outcome("passwords_by_folder").unwrap().result,
        Err(QueryError::InvalidCount(_))
    ));
    assert_eq!(
        labeled_values(&engine, "passwords_by_folder"),
        vec![(vec!["f1".to_string()], 4)]
    );
}

#[tokio::test]
async fn null_labels_use_sentinel() {
    let store = Arc::new(MemoryStore::new());
    let by_email = def("duplicate_organizations_by_email");
    store.set_rows(
        by_email.query.to_sql(),
        vec![vec![Cell::Null, Cell::Integer(2)]],
    );
    let engine = engine(&store, &["duplicate_organizations_by_email"]);
    engine.refresh().await;

    let series = engine.registry().get("duplicate_organizations_by_email").unwrap();
    assert_eq!(series.get(&["<null>"]), Some(2));
}

#[tokio::test(start_paused = true)]
async fn slow_query_times_out() {
    let store = Arc::new(MemoryStore::with_latency(Duration::from_secs(30)));
    store.respond_scalar(&def("users"), 5);
    let registry = Registry::register(vec![def("users")]).unwrap();
    let engine = Arc::new(RefreshEngine::new(
        Arc::new(registry),
        QueryExecutor::new(store.clone(), Duration::from_secs(1)),
    ));

    let report = engine.refresh().await;
    assert_eq!(
        report.outcome("users").unwrap().result,
        Err(QueryError::Timeout(Duration::from_secs(1)))
    );
    assert_eq!(engine.registry().get("users").unwrap().value(), Some(0));
}

#[tokio::test]
async fn runs_in_name_order() {
    let store = Arc::new(MemoryStore::new());
    for name in ["users", "passwords", "folders"] {
        store.respond_scalar(&def(name), 1);
    }
    let engine = engine(&store, &["users", "passwords", "folders"]);

    let report = engine.refresh().await;
    let order: Vec<_> = report.outcomes.iter().map(|o| o.metric).collect();
    assert_eq!(order, vec!["folders", "passwords", "users"]);

    let json = engine.last_report().unwrap().to_json();
    assert_eq!(json["outcomes"][0]["metric"], "folders");
    assert_eq!(json["outcomes"][0]["ok"], true);
}

#[tokio::test]
async fn timer_tick_is_dropped_while_refreshing() {
    let store = Arc::new(MemoryStore::with_latency(Duration::from_millis(50)));
    store.respond_scalar(&def("users"), 1);
    let engine = engine(&store, &["users"]);

    let busy = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.refresh().await })
    };
    // let the forced refresh take the gate
    while engine.refreshes_started() == 0 {
        tokio::task::yield_now().await;
    }
    assert!(engine.try_refresh().await.is_none());
    busy.await.unwrap();

    assert!(engine.try_refresh().await.is_some());
    assert_eq!(engine.refreshes_started(), 2);
}

#[tokio::test]
async fn wide_scalar_row_is_column_count_error() {
    let store = Arc::new(MemoryStore::new());
    store.set_rows(
        def("users").query.to_sql(),
        vec![vec![Cell::Integer(5), Cell::Integer(6)]],
    );
    let engine = engine(&store, &["users"]);

    let report = engine.refresh().await;
    assert_eq!(
        report.outcome("users").unwrap().result,
        Err(QueryError::ColumnCount { expected: 1, actual: 2 })
    );
    assert_eq!(engine.registry().get("users").unwrap().value(), Some(0));
}

#[tokio::test]
async fn status_agrees_with_last_report() {
    let store = Arc::new(MemoryStore::new());
    store.respond_scalar(&def("users"), 1);
    let engine = engine(&store, &["users"]);

    for _ in 0..3 {
        let report = engine.refresh().await;
        let status = engine.status();
        let last = engine.last_report().unwrap();
        assert_eq!(status.refresh_count, report.seq);
        assert_eq!(last.seq, report.seq);
        let finished = last
            .finished_at
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs_f64();
        assert_eq!(status.last_refresh_unix, Some(finished));
    }
}

#[tokio::test(start_paused = true)]
async fn abandoned_caller_does_not_stop_refresh() {
    let store = Arc::new(MemoryStore::with_latency(Duration::from_secs(2)));
    store.respond_scalar(&def("folders"), 7);
    store.respond_scalar(&def("users"), 3);
    let engine = engine(&store, &["folders", "users"]);

    // caller gives up after the first metric, mid-cycle
    let gave_up = tokio::time::timeout(Duration::from_secs(3), engine.refresh()).await;
    assert!(gave_up.is_err());
    assert_eq!(engine.status().state, EngineState::Refreshing);

    tokio::time::sleep(Duration::from_secs(60)).await;

    let status = engine.status();
    assert_eq!(status.state, EngineState::Idle);
    assert_eq!(status.refresh_count, 1);
    assert!(status.last_refresh_unix.is_some());
    assert_eq!(engine.registry().get("folders").unwrap().value(), Some(7));
    assert_eq!(engine.registry().get("users").unwrap().value(), Some(3));
    // the gate was released
    assert!(engine.try_refresh().await.is_some());
}
