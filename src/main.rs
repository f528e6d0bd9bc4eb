//! Watchtower service entrypoint.
//! Restores monitors, starts the periodic check cycle and serves the HTTP API.

use std::sync::Arc;

use shuttle_axum::ShuttleAxum;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use watchtower::config::{load_config_default, WatchtowerConfig};
use watchtower::history::AlertLog;
use watchtower::metrics::Metrics;
use watchtower::monitor::MonitorRegistry;
use watchtower::rank::HotReloadWeights;
use watchtower::scheduler::{spawn_cycle_driver, CheckScheduler};
use watchtower::source::{FixtureProvider, HttpFeedProvider, SourceProvider};
use watchtower::store::SnapshotStore;
use watchtower::AppState;

/// Compact logs by default, JSON when WATCHTOWER_LOG_JSON=1.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("watchtower=info,warn"));
    let json = std::env::var("WATCHTOWER_LOG_JSON").is_ok_and(|v| v == "1");

    // The runtime may already have installed a subscriber; keep it then.
    let _ = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init()
    };
}

fn build_provider(cfg: &WatchtowerConfig) -> Arc<dyn SourceProvider> {
    if cfg.provider.feeds.is_empty() {
        tracing::warn!("no provider feeds configured; monitors will find nothing");
        Arc::new(FixtureProvider::new())
    } else {
        Arc::new(
            HttpFeedProvider::new(cfg.provider.feeds.clone())
                .with_timeout(cfg.provider.timeout_secs),
        )
    }
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = load_config_default()?;
    tracing::info!(
        cycle_interval_secs = cfg.cycle_interval_secs,
        max_concurrency = cfg.max_concurrency,
        state_path = %cfg.state_path.display(),
        "config loaded"
    );

    // Recorder first: the driver's immediate first tick already emits.
    let metrics = Metrics::init()?;

    let store = Arc::new(SnapshotStore::new(&cfg.state_path));
    let restored = store.load().await.map_err(anyhow::Error::from)?;
    let registry = Arc::new(MonitorRegistry::restore(cfg.dedup_capacity, restored));

    let scheduler = Arc::new(
        CheckScheduler::new(Arc::clone(&registry), build_provider(&cfg))
            .with_alert_log(Arc::new(AlertLog::with_capacity(cfg.alert_log_capacity)))
            .with_weights(Arc::new(HotReloadWeights::new(Some(cfg.weights_path.as_path()))))
            .with_max_concurrency(cfg.max_concurrency),
    );

    // Runs for the lifetime of the process.
    spawn_cycle_driver(
        Arc::clone(&scheduler),
        cfg.cycle_interval(),
        Some(Arc::clone(&store)),
        CancellationToken::new(),
    );

    let state = AppState::new(scheduler, Some(store));
    let router = watchtower::router(state).merge(metrics.router());

    Ok(router.into())
}
