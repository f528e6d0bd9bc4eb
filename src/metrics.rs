use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("monitor_cycles_total", "Check cycles run.");
        describe_counter!("monitor_alerts_total", "Alerts generated.");
        describe_counter!(
            "monitor_findings_new_total",
            "Findings that survived deduplication."
        );
        describe_counter!(
            "monitor_findings_deduped_total",
            "Findings dropped as already seen."
        );
        describe_counter!(
            "monitor_provider_errors_total",
            "Source provider fetch failures."
        );
        describe_histogram!("monitor_cycle_ms", "Cycle duration in milliseconds.");
        describe_histogram!("source_fetch_ms", "Feed fetch time in milliseconds.");
        describe_gauge!(
            "monitor_cycle_last_run_ts",
            "Unix ts of the last cycle's check time."
        );
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder. Fails if one is already installed.
    pub fn init() -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new().install_recorder()?;
        ensure_metrics_described();
        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
