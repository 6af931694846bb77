//! Hotspot Monitor: Binary Entrypoint
//! Loads config, wires connectors into the engine, starts the periodic
//! scorer and serves the Axum router.

use std::sync::Arc;

use hotspot_monitor::config::AppConfig;
use hotspot_monitor::ingest::fetcher::{ReqwestTransport, ThreadRandom};
use hotspot_monitor::ingest::scheduler::spawn_scheduler;
use hotspot_monitor::metrics::Metrics;
use hotspot_monitor::{build_state, create_router};
use shuttle_axum::ShuttleAxum;
use tokio::sync::watch;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("hotspot_monitor=info,warn"));

    // the hosting runtime may already own the global subscriber
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AppConfig::load_default()?;
    tracing::info!(
        tick_secs = cfg.engine.tick_interval_secs,
        feeds = cfg.news.feeds.len(),
        trends = cfg.trends.serpapi_key.is_some(),
        synthetic_fallback = cfg.engine.synthetic_fallback,
        "config loaded"
    );

    let transport = Arc::new(ReqwestTransport::new(&cfg.fetch.user_agent)?);
    let state = build_state(&cfg, transport, Arc::new(ThreadRandom))?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    spawn_scheduler(state.engine.clone(), cfg.tick_interval(), shutdown_rx);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        }
    });

    let mut router = create_router(state);
    match Metrics::init(&cfg) {
        Ok(m) => router = router.merge(m.router()),
        Err(e) => tracing::warn!(error = %e, "metrics endpoint disabled"),
    }

    Ok(router.into())
}
