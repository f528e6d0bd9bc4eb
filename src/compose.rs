// src/compose.rs
//! Alert and digest composition.

use std::cmp::Reverse;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::finding::Finding;
use crate::history::AlertLog;
use crate::monitor::{Monitor, MonitorId, MonitorKind};

/// Highlights per digest; fixed so digests stay scannable.
pub const DIGEST_HIGHLIGHTS: usize = 4;

/// New findings of one monitor from one cycle. Never empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub monitor_id: MonitorId,
    pub findings: Vec<Finding>,
    pub generated_at: DateTime<Utc>,
}

/// Build an alert, ordering findings HIGH → MEDIUM → LOW and keeping the
/// provider's order inside a tier.
///
/// # Panics
/// When `new_findings` is empty; callers only compose alerts for new findings.
pub fn compose_alert(
    monitor_id: &MonitorId,
    mut new_findings: Vec<Finding>,
    generated_at: DateTime<Utc>,
) -> Alert {
    assert!(
        !new_findings.is_empty(),
        "compose_alert called with zero findings for {monitor_id}"
    );
    new_findings.sort_by_key(|f| Reverse(f.priority));
    Alert {
        monitor_id: monitor_id.clone(),
        findings: new_findings,
        generated_at,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigestWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DigestWindow {
    /// The `days` days ending at `end`; `None` when the start falls outside
    /// chrono's date range.
    pub fn last_days(end: DateTime<Utc>, days: u32) -> Option<Self> {
        let span = chrono::Duration::try_days(i64::from(days))?;
        let start = end.checked_sub_signed(span)?;
        Some(Self { start, end })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Digest {
    pub contact: String,
    pub window: DigestWindow,
    pub grouped_findings: BTreeMap<MonitorKind, Vec<Finding>>,
    pub highlights: Vec<Finding>,
    pub counts: BTreeMap<MonitorKind, usize>,
    pub alerts_included: usize,
}

/// Aggregate the alerts of `contact`'s monitors generated inside `window`.
///
/// Findings are grouped by kind in alert order; highlights are the top
/// [`DIGEST_HIGHLIGHTS`] by priority, then most recent discovery.
pub fn compose_digest(
    contact: &str,
    monitors: &[Monitor],
    alerts: &AlertLog,
    window: DigestWindow,
) -> Digest {
    let contact = contact.trim();
    let owned: Vec<MonitorId> = monitors
        .iter()
        .filter(|m| m.contact == contact)
        .map(|m| m.id.clone())
        .collect();
    let included = alerts.in_window(&owned, window.start, window.end);

    let mut grouped_findings: BTreeMap<MonitorKind, Vec<Finding>> = BTreeMap::new();
    for alert in &included {
        for f in &alert.findings {
            grouped_findings.entry(f.kind).or_default().push(f.clone());
        }
    }

    let mut all: Vec<Finding> = grouped_findings.values().flatten().cloned().collect();
    all.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| b.discovered_at.cmp(&a.discovered_at))
    });
    all.truncate(DIGEST_HIGHLIGHTS);

    let counts = grouped_findings
        .iter()
        .map(|(k, v)| (*k, v.len()))
        .collect();

    Digest {
        contact: contact.to_string(),
        window,
        grouped_findings,
        highlights: all,
        counts,
        alerts_included: included.len(),
    }
}
