// tests/concurrency.rs
//
// Per-monitor in-flight guard, bounded worker pool and cycle cancellation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use watchtower::finding::RawFinding;
use watchtower::monitor::{Monitor, MonitorKind, MonitorRegistry, Parameters};
use watchtower::scheduler::FailureReason;
use watchtower::source::SourceProvider;
use watchtower::CheckScheduler;

fn at(h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 9, 6, h, 0, 0).unwrap()
}

fn job_monitor(reg: &MonitorRegistry, company: &str) -> Monitor {
    let params: Parameters =
        serde_json::from_value(json!({"companies": [company], "keywords": ["AI"]})).unwrap();
    reg.create(MonitorKind::JobPostings, params, "ops@example.com", Duration::from_secs(60))
        .unwrap()
}

/// Blocks every fetch until `release` is notified; signals `entered` first.
struct GatedProvider {
    entered: Notify,
    release: Notify,
}

impl GatedProvider {
    fn new() -> Self {
        Self {
            entered: Notify::new(),
            release: Notify::new(),
        }
    }
}

#[async_trait]
impl SourceProvider for GatedProvider {
    async fn fetch(&self, _kind: MonitorKind, _p: &Parameters) -> anyhow::Result<Vec<RawFinding>> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(vec![RawFinding::from_pairs([
            ("company", "Acme"),
            ("title", "AI Engineer"),
            ("url", "acme.com/1"),
        ])])
    }

    fn name(&self) -> &'static str {
        "gated"
    }
}

#[tokio::test]
async fn overlapping_cycle_skips_monitor_still_in_flight() {
    let reg = Arc::new(MonitorRegistry::default());
    let m = job_monitor(&reg, "Acme");
    let provider = Arc::new(GatedProvider::new());
    let sched = Arc::new(CheckScheduler::new(Arc::clone(&reg), provider.clone()));

    let slow = {
        let sched = Arc::clone(&sched);
        tokio::spawn(async move { sched.run_cycle(at(9)).await })
    };
    provider.entered.notified().await;

    // Still due (never touched), but its check is running.
    let overlap = sched.run_cycle(at(9)).await;
    assert_eq!(overlap.monitors_checked, 0);
    assert_eq!(overlap.skipped_in_flight, vec![m.id.clone()]);
    assert!(overlap.errors.is_empty());

    provider.release.notify_one();
    let first = slow.await.unwrap();
    assert_eq!(first.alerts_generated, 1);
    assert_eq!(reg.get(&m.id).unwrap().seen_fingerprints.len(), 1);
    assert_eq!(sched.alerts().len(), 1);
}

#[tokio::test]
async fn cancellation_mid_fetch_leaves_state_untouched() {
    let reg = Arc::new(MonitorRegistry::default());
    let m = job_monitor(&reg, "Acme");
    let provider = Arc::new(GatedProvider::new());
    let sched = Arc::new(CheckScheduler::new(Arc::clone(&reg), provider.clone()));
    let cancel = CancellationToken::new();

    let running = {
        let sched = Arc::clone(&sched);
        let cancel = cancel.clone();
        tokio::spawn(async move { sched.run_cycle_with_cancel(at(9), &cancel).await })
    };
    provider.entered.notified().await;
    cancel.cancel();

    let report = running.await.unwrap();
    assert!(report.cancelled);
    assert_eq!(report.alerts_generated, 0);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].reason, FailureReason::Cancelled);

    let m = reg.get(&m.id).unwrap();
    assert!(m.last_checked.is_none());
    assert!(m.seen_fingerprints.is_empty());
    assert!(sched.alerts().is_empty());

    // The claim was released: a fresh cycle checks the monitor normally.
    provider.release.notify_one();
    let next = sched.run_cycle(at(9)).await;
    assert_eq!(next.monitors_checked, 1);
    assert!(next.skipped_in_flight.is_empty());
}

/// Records the peak number of concurrent fetches.
struct CountingProvider {
    current: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

#[async_trait]
impl SourceProvider for CountingProvider {
    async fn fetch(&self, _kind: MonitorKind, _p: &Parameters) -> anyhow::Result<Vec<RawFinding>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.current.fetch_sub(1, Ordering::SeqCst);
        Ok(Vec::new())
    }

    fn name(&self) -> &'static str {
        "counting"
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn worker_pool_bounds_concurrent_fetches() {
    let reg = Arc::new(MonitorRegistry::default());
    for company in ["A", "B", "C", "D", "E", "F"] {
        job_monitor(&reg, company);
    }
    let provider = Arc::new(CountingProvider {
        current: AtomicUsize::new(0),
        peak: AtomicUsize::new(0),
        calls: AtomicUsize::new(0),
    });
    let sched = CheckScheduler::new(Arc::clone(&reg), provider.clone()).with_max_concurrency(2);

    let report = sched.run_cycle(at(9)).await;
    assert_eq!(report.monitors_checked, 6);
    assert_eq!(provider.calls.load(Ordering::SeqCst), 6);
    let peak = provider.peak.load(Ordering::SeqCst);
    assert!((1..=2).contains(&peak), "peak concurrency was {peak}");
}
