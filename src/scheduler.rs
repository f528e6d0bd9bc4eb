// src/scheduler.rs
//! Check Scheduler: one cycle = every due monitor checked once.
//!
//! Per monitor, in order: fetch from the provider, drop already-seen
//! fingerprints, rank what is left, compose an alert when anything survived,
//! then `touch` the registry (last check time + new fingerprints in one step).
//!
//! Monitors are checked concurrently on a bounded worker pool. A monitor whose
//! previous check is still running is skipped rather than checked twice, so a
//! monitor's dedup set only ever has one writer.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use metrics::{counter, gauge, histogram};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::compose::{compose_alert, Alert};
use crate::finding::{Finding, RawFinding};
use crate::fingerprint::fingerprint;
use crate::history::AlertLog;
use crate::monitor::{Monitor, MonitorId, MonitorRegistry};
use crate::notify::{LogNotifier, Notifier};
use crate::rank::{bucket, criteria_for_finding, score, HotReloadWeights, Weights};
use crate::source::SourceProvider;
use crate::store::SnapshotStore;

pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// The provider call failed; the monitor stays due.
    Provider,
    /// The cycle was cancelled before this monitor finished.
    Cancelled,
    /// The registry rejected the state update.
    Registry,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckFailure {
    pub monitor_id: MonitorId,
    pub reason: FailureReason,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub monitors_checked: usize,
    pub alerts_generated: usize,
    /// Every new finding of this cycle, grouped by alert.
    pub findings: Vec<Finding>,
    pub alerts: Vec<Alert>,
    pub errors: Vec<CheckFailure>,
    /// Due monitors whose previous check was still running.
    pub skipped_in_flight: Vec<MonitorId>,
    pub cancelled: bool,
}

impl CycleReport {
    fn empty(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            monitors_checked: 0,
            alerts_generated: 0,
            findings: Vec::new(),
            alerts: Vec::new(),
            errors: Vec::new(),
            skipped_in_flight: Vec::new(),
            cancelled: false,
        }
    }
}

enum CheckOutcome {
    Checked(Option<Alert>),
    Failed(CheckFailure),
    InFlight,
    /// Became inactive or was checked by someone else since the due query.
    NoLongerDue,
}

/// Monitor ids with a check in progress.
#[derive(Debug, Default)]
struct InFlight(Mutex<HashSet<MonitorId>>);

/// Releases the in-flight claim on drop, including on panic or cancellation.
struct InFlightGuard {
    set: Arc<InFlight>,
    id: MonitorId,
}

impl InFlight {
    fn try_claim(self: &Arc<Self>, id: &MonitorId) -> Option<InFlightGuard> {
        if !self.0.lock().insert(id.clone()) {
            return None;
        }
        Some(InFlightGuard {
            set: Arc::clone(self),
            id: id.clone(),
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.set.0.lock().remove(&self.id);
    }
}

pub struct CheckScheduler {
    registry: Arc<MonitorRegistry>,
    provider: Arc<dyn SourceProvider>,
    alerts: Arc<AlertLog>,
    notifier: Arc<dyn Notifier>,
    weights: Arc<HotReloadWeights>,
    workers: Arc<Semaphore>,
    in_flight: Arc<InFlight>,
}

impl CheckScheduler {
    pub fn new(registry: Arc<MonitorRegistry>, provider: Arc<dyn SourceProvider>) -> Self {
        Self {
            registry,
            provider,
            alerts: Arc::new(AlertLog::default()),
            notifier: Arc::new(LogNotifier),
            weights: Arc::new(HotReloadWeights::fixed(Weights::default())),
            workers: Arc::new(Semaphore::new(DEFAULT_MAX_CONCURRENCY)),
            in_flight: Arc::new(InFlight::default()),
        }
    }

    pub fn with_alert_log(mut self, alerts: Arc<AlertLog>) -> Self {
        self.alerts = alerts;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_weights(mut self, weights: Arc<HotReloadWeights>) -> Self {
        self.weights = weights;
        self
    }

    /// At most `n` provider calls in flight per cycle (minimum 1).
    pub fn with_max_concurrency(mut self, n: usize) -> Self {
        self.workers = Arc::new(Semaphore::new(n.max(1)));
        self
    }

    pub fn registry(&self) -> &Arc<MonitorRegistry> {
        &self.registry
    }

    pub fn alerts(&self) -> &Arc<AlertLog> {
        &self.alerts
    }

    pub async fn run_cycle(&self, now: DateTime<Utc>) -> CycleReport {
        self.run_cycle_with_cancel(now, &CancellationToken::new()).await
    }

    /// Check every monitor due at `now`. Always returns a report; failures of
    /// single monitors are listed in `errors`.
    pub async fn run_cycle_with_cancel(
        &self,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> CycleReport {
        crate::metrics::ensure_metrics_described();
        let t0 = Instant::now();
        let due = self.registry.due_for_check(now);
        let mut report = CycleReport::empty(now);
        let weights = self.weights.current();

        let tasks: Vec<(MonitorId, JoinHandle<CheckOutcome>)> = due
            .into_iter()
            .map(|monitor| {
                let id = monitor.id.clone();
                let task = CheckTask {
                    registry: Arc::clone(&self.registry),
                    provider: Arc::clone(&self.provider),
                    alerts: Arc::clone(&self.alerts),
                    notifier: Arc::clone(&self.notifier),
                    weights,
                    workers: Arc::clone(&self.workers),
                    in_flight: Arc::clone(&self.in_flight),
                    cancel: cancel.clone(),
                };
                (id, tokio::spawn(task.run(monitor.id, now)))
            })
            .collect();

        // Awaited in due order so the report is deterministic.
        for (id, handle) in tasks {
            let outcome = match handle.await {
                Ok(o) => o,
                Err(e) => {
                    error!(target: "scheduler", monitor_id = %id, error = %e, "check task aborted");
                    CheckOutcome::Failed(CheckFailure {
                        monitor_id: id.clone(),
                        reason: FailureReason::Registry,
                        message: format!("check task aborted: {e}"),
                    })
                }
            };
            match outcome {
                CheckOutcome::Checked(alert) => {
                    report.monitors_checked += 1;
                    if let Some(alert) = alert {
                        report.alerts_generated += 1;
                        report.findings.extend(alert.findings.iter().cloned());
                        report.alerts.push(alert);
                    }
                }
                CheckOutcome::Failed(f) => report.errors.push(f),
                CheckOutcome::InFlight => report.skipped_in_flight.push(id),
                CheckOutcome::NoLongerDue => {}
            }
        }
        report.cancelled = cancel.is_cancelled();

        counter!("monitor_cycles_total").increment(1);
        counter!("monitor_alerts_total").increment(report.alerts_generated as u64);
        counter!("monitor_findings_new_total").increment(report.findings.len() as u64);
        gauge!("monitor_cycle_last_run_ts").set(now.timestamp() as f64);
        histogram!("monitor_cycle_ms").record(t0.elapsed().as_millis() as f64);

        info!(
            target: "scheduler",
            checked = report.monitors_checked,
            alerts = report.alerts_generated,
            findings = report.findings.len(),
            errors = report.errors.len(),
            skipped = report.skipped_in_flight.len(),
            cancelled = report.cancelled,
            "cycle finished"
        );
        report
    }
}

/// Everything one spawned check needs, detached from the scheduler's lifetime.
struct CheckTask {
    registry: Arc<MonitorRegistry>,
    provider: Arc<dyn SourceProvider>,
    alerts: Arc<AlertLog>,
    notifier: Arc<dyn Notifier>,
    weights: Weights,
    workers: Arc<Semaphore>,
    in_flight: Arc<InFlight>,
    cancel: CancellationToken,
}

impl CheckTask {
    async fn run(self, id: MonitorId, now: DateTime<Utc>) -> CheckOutcome {
        let Some(_guard) = self.in_flight.try_claim(&id) else {
            debug!(target: "scheduler", monitor_id = %id, "check already in flight; skipped");
            return CheckOutcome::InFlight;
        };

        let _permit = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return cancelled(&id),
            permit = Arc::clone(&self.workers).acquire_owned() => match permit {
                Ok(p) => p,
                Err(_) => return cancelled(&id),
            },
        };

        // Re-read under the claim: the due list may be stale.
        let Some(monitor) = self.registry.get(&id).filter(|m| m.is_due(now)) else {
            return CheckOutcome::NoLongerDue;
        };

        let fetched = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return cancelled(&id),
            res = self.provider.fetch(monitor.kind, &monitor.parameters) => res,
        };
        let raws = match fetched {
            Ok(v) => v,
            Err(e) => {
                warn!(
                    target: "scheduler",
                    monitor_id = %id,
                    provider = self.provider.name(),
                    error = %format!("{e:#}"),
                    "provider error"
                );
                counter!("monitor_provider_errors_total").increment(1);
                return CheckOutcome::Failed(CheckFailure {
                    monitor_id: id,
                    reason: FailureReason::Provider,
                    message: format!("{e:#}"),
                });
            }
        };

        let fetched_count = raws.len();
        let new_findings = new_findings(&monitor, raws, now, &self.weights);
        counter!("monitor_findings_deduped_total")
            .increment((fetched_count - new_findings.len()) as u64);

        if self.cancel.is_cancelled() {
            return cancelled(&id);
        }

        if new_findings.is_empty() {
            return match self.registry.touch(&id, now, Vec::new()) {
                Ok(_) => {
                    debug!(target: "scheduler", monitor_id = %id, fetched = fetched_count, "nothing new");
                    CheckOutcome::Checked(None)
                }
                Err(e) => registry_failure(id, e),
            };
        }

        let fingerprints: Vec<_> = new_findings.iter().map(|f| f.fingerprint.clone()).collect();
        let alert = compose_alert(&id, new_findings, now);
        if let Err(e) = self.registry.touch(&id, now, fingerprints) {
            return registry_failure(id, e);
        }
        self.alerts.push(alert.clone());

        info!(
            target: "scheduler",
            monitor_id = %id,
            kind = %monitor.kind,
            fetched = fetched_count,
            new = alert.findings.len(),
            top = alert.findings[0].priority.as_str(),
            "alert generated"
        );

        if let Err(e) = self.notifier.send(&monitor, &alert).await {
            warn!(
                target: "scheduler",
                monitor_id = %id,
                notifier = self.notifier.name(),
                error = %format!("{e:#}"),
                "alert delivery failed"
            );
        }
        CheckOutcome::Checked(Some(alert))
    }
}

fn cancelled(id: &MonitorId) -> CheckOutcome {
    debug!(target: "scheduler", monitor_id = %id, "check cancelled");
    CheckOutcome::Failed(CheckFailure {
        monitor_id: id.clone(),
        reason: FailureReason::Cancelled,
        message: "cycle cancelled".to_string(),
    })
}

fn registry_failure(id: MonitorId, e: crate::error::MonitorError) -> CheckOutcome {
    error!(target: "scheduler", monitor_id = %id, error = %e, "registry update failed");
    CheckOutcome::Failed(CheckFailure {
        monitor_id: id,
        reason: FailureReason::Registry,
        message: e.to_string(),
    })
}

/// Fingerprint, drop seen ones (and repeats inside this batch), rank the rest.
/// Provider order is preserved.
pub fn new_findings(
    monitor: &Monitor,
    raws: Vec<RawFinding>,
    now: DateTime<Utc>,
    weights: &Weights,
) -> Vec<Finding> {
    let mut batch = HashSet::new();
    raws.into_iter()
        .filter_map(|raw| {
            let fp = fingerprint(monitor.kind, &raw.fields);
            if monitor.seen_fingerprints.contains(&fp) || !batch.insert(fp.clone()) {
                return None;
            }
            let out = score(
                &criteria_for_finding(monitor.kind, &raw.fields, &monitor.parameters),
                weights,
            );
            Some(Finding {
                monitor_id: monitor.id.clone(),
                kind: monitor.kind,
                discovered_at: raw.discovered_at.unwrap_or(now),
                fields: raw.fields,
                fingerprint: fp,
                priority: bucket(out.score),
                score: out.score,
            })
        })
        .collect()
}

/// Run a cycle every `interval` until `cancel` fires, persisting the registry
/// after each cycle when a store is given.
pub fn spawn_cycle_driver(
    scheduler: Arc<CheckScheduler>,
    interval: Duration,
    store: Option<Arc<SnapshotStore>>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            let report = scheduler.run_cycle_with_cancel(Utc::now(), &cancel).await;
            if let Some(store) = &store {
                if let Err(e) = store.save(scheduler.registry()).await {
                    warn!(target: "scheduler", error = %e, "persisting monitors failed");
                }
            }
            if report.cancelled {
                break;
            }
        }
        info!(target: "scheduler", "cycle driver stopped");
    })
}
