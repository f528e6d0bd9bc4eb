//! Demo: one job monitor, two cycles over the same fixture feed.
//! The first cycle alerts, the second finds nothing new.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use watchtower::monitor::{MonitorKind, MonitorRegistry, Parameters};
use watchtower::notify::render_alert_text;
use watchtower::source::FixtureProvider;
use watchtower::{CheckScheduler, RawFinding};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let registry = Arc::new(MonitorRegistry::default());
    let params: Parameters = serde_json::from_value(json!({
        "companies": ["Acme"],
        "keywords": ["AI"],
    }))?;
    let monitor = registry.create(
        MonitorKind::JobPostings,
        params,
        "demo@example.com",
        Duration::from_secs(1),
    )?;

    let provider = FixtureProvider::new().with(
        MonitorKind::JobPostings,
        vec![
            RawFinding::from_pairs([
                ("company", "Acme"),
                ("title", "AI Engineer"),
                ("url", "acme.com/1"),
            ]),
            RawFinding::from_pairs([
                ("company", "Acme"),
                ("title", "Office Manager"),
                ("url", "acme.com/2"),
            ]),
        ],
    );
    let scheduler = CheckScheduler::new(Arc::clone(&registry), Arc::new(provider));

    for cycle in 1..=2 {
        let now = Utc::now() + chrono::Duration::seconds(i64::from(cycle) * 2);
        let report = scheduler.run_cycle(now).await;
        println!(
            "cycle {cycle}: checked={} alerts={} new_findings={}",
            report.monitors_checked,
            report.alerts_generated,
            report.findings.len()
        );
        for alert in &report.alerts {
            if let Some(m) = registry.get(&alert.monitor_id) {
                println!("  {}", render_alert_text(&m, alert));
            }
        }
    }

    let m = registry.get(&monitor.id).map(|m| m.seen_fingerprints.len());
    println!("cycle-demo done (seen fingerprints: {})", m.unwrap_or_default());
    Ok(())
}
