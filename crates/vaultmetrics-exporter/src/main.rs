//! vaultmetrics exporter
//!
//! Serves Vaultwarden database statistics on `/metrics`. Each scrape
//! refreshes the values when the last refresh is older than
//! `refresh.min_interval_secs`; otherwise the held values are served.

use std::process::ExitCode;

use tracing_subscriber::{fmt, EnvFilter};

use vaultmetrics_core::error::{ExporterError, Result};
use vaultmetrics_exporter::{app_state, catalog, config, refresh, router};

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "exporter stopped");
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<()> {
    let path = std::env::var(config::CONFIG_ENV).unwrap_or_else(|_| config::DEFAULT_CONFIG_PATH.into());
    let cfg = config::load_from_file(&path)?;
    let listen = cfg.exporter.listen_addr()?;
    let background = cfg.refresh.background_interval();

    let state = app_state::AppState::connect(cfg, catalog::vault()).await?;

    // first readings before the listener opens
    let report = state.engine().refresh().await;
    if !report.is_clean() {
        tracing::warn!(failed = report.failures().count(), "initial refresh incomplete");
    }

    let timer = background.map(|period| {
        tracing::info!(period_secs = period.as_secs(), "timer-driven refresh enabled");
        refresh::spawn_background(state.engine(), period)
    });

    let app = router::build_router(state);

    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .map_err(|e| ExporterError::Startup(format!("bind {listen} failed: {e}")))?;
    tracing::info!(%listen, "vaultmetrics-exporter starting");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ExporterError::Startup(format!("server failed: {e}")))?;

    if let Some(timer) = timer {
        timer.abort();
    }
    tracing::info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
