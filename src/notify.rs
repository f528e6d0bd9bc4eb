// src/notify.rs
//! Outbound alert delivery seam. Real transports live outside this crate;
//! the built-in notifier only writes a log line.

use anyhow::Result;

use crate::compose::Alert;
use crate::fingerprint::anon_hash;
use crate::monitor::Monitor;

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `alert` generated for `monitor` to `monitor.contact`.
    async fn send(&self, monitor: &Monitor, alert: &Alert) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Logs each alert at INFO on target `notify`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, monitor: &Monitor, alert: &Alert) -> Result<()> {
        tracing::info!(
            target: "notify",
            monitor_id = %monitor.id,
            contact = %anon_hash(&monitor.contact),
            findings = alert.findings.len(),
            "{}",
            render_alert_text(monitor, alert)
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// One-line summary: count, kind, top priority and the first few headlines.
pub fn render_alert_text(monitor: &Monitor, alert: &Alert) -> String {
    let top = alert
        .findings
        .first()
        .map(|f| f.priority.as_str())
        .unwrap_or("LOW");
    let headlines: Vec<String> = alert.findings.iter().take(3).map(|f| f.headline()).collect();
    let more = alert.findings.len().saturating_sub(headlines.len());
    let mut text = format!(
        "{} new {} finding(s) [top: {}]: {}",
        alert.findings.len(),
        monitor.kind,
        top,
        headlines.join(" · ")
    );
    if more > 0 {
        text.push_str(&format!(" (+{more} more)"));
    }
    text
}
