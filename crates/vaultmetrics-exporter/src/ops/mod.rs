//! HTTP endpoints.
//!
//! - `/metrics` : Prometheus text format (may trigger a refresh)
//! - `/healthz` : liveness
//! - `/status`  : refresh state and the last report as JSON

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use vaultmetrics_core::exposition::CONTENT_TYPE;

use crate::app_state::AppState;

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

pub async fn metrics(State(state): State<AppState>) -> Response {
    let body = state.scrape().scrape().await;

    (StatusCode::OK, [(header::CONTENT_TYPE, CONTENT_TYPE)], body).into_response()
}

pub async fn status(State(state): State<AppState>) -> Response {
    let engine = state.engine();
    let metrics: Vec<_> = engine
        .registry()
        .all()
        .map(|(def, series)| {
            json!({
                "name": def.name,
                "kind": def.kind,
                "labels": def.label_names,
                "series": series.len(),
            })
        })
        .collect();

    Json(json!({
        "refresh": engine.status(),
        "min_refresh_interval_secs": state.scrape().policy().min_interval().as_secs(),
        "requests": state.scrape().request_count(),
        "metrics": metrics,
        "last_report": engine.last_report().map(|r| r.to_json()),
    }))
    .into_response()
}
