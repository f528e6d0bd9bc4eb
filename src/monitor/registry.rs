// src/monitor/registry.rs
//! Monitor Registry: owns every monitor and its dedup state.
//!
//! All mutation goes through `create`, `set_active` and `touch`, each applied
//! under one write lock so readers never observe a half-updated monitor.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::{debug, info};

use super::{
    check_frequency, validate_parameters, Monitor, MonitorId, MonitorKind, Parameters, SeenFingerprints,
    DEFAULT_SEEN_CAPACITY,
};
use crate::error::{MonitorError, Result};
use crate::fingerprint::{anon_hash, Fingerprint};

#[derive(Debug)]
pub struct MonitorRegistry {
    inner: RwLock<Inner>,
    dedup_capacity: usize,
}

#[derive(Debug, Default)]
struct Inner {
    /// Insertion order, for stable listings.
    order: Vec<MonitorId>,
    monitors: HashMap<MonitorId, Monitor>,
}

/// Result of a successful `touch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TouchOutcome {
    pub added: usize,
    pub evicted: usize,
}

impl Default for MonitorRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_SEEN_CAPACITY)
    }
}

impl MonitorRegistry {
    /// `dedup_capacity` bounds each monitor's remembered fingerprints.
    pub fn new(dedup_capacity: usize) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            dedup_capacity: dedup_capacity.max(1),
        }
    }

    /// Rebuild a registry from persisted monitors, keeping their order.
    pub fn restore(dedup_capacity: usize, monitors: Vec<Monitor>) -> Self {
        let reg = Self::new(dedup_capacity);
        {
            let mut inner = reg.inner.write();
            for m in monitors {
                if inner.monitors.contains_key(&m.id) {
                    continue;
                }
                inner.order.push(m.id.clone());
                inner.monitors.insert(m.id.clone(), m);
            }
        }
        reg
    }

    pub fn dedup_capacity(&self) -> usize {
        self.dedup_capacity
    }

    /// Register a new active monitor. Nothing is stored when validation fails.
    pub fn create(
        &self,
        kind: MonitorKind,
        parameters: Parameters,
        contact: &str,
        frequency: Duration,
    ) -> Result<Monitor> {
        validate_parameters(kind, &parameters)?;
        let contact = contact.trim();
        if contact.is_empty() {
            return Err(MonitorError::invalid("contact is required"));
        }
        let frequency = check_frequency(frequency)?;

        let monitor = Monitor {
            id: MonitorId::generate(kind),
            kind,
            parameters,
            contact: contact.to_string(),
            frequency_secs: frequency.as_secs(),
            active: true,
            created_at: Utc::now(),
            last_checked: None,
            seen_fingerprints: SeenFingerprints::with_capacity(self.dedup_capacity),
        };

        let mut inner = self.inner.write();
        inner.order.push(monitor.id.clone());
        inner.monitors.insert(monitor.id.clone(), monitor.clone());

        info!(
            target: "monitor",
            monitor_id = %monitor.id,
            kind = %kind,
            contact = %anon_hash(&monitor.contact),
            frequency_secs = monitor.frequency_secs,
            "monitor created"
        );
        Ok(monitor)
    }

    pub fn get(&self, id: &MonitorId) -> Option<Monitor> {
        self.inner.read().monitors.get(id).cloned()
    }

    /// All monitors in insertion order, optionally only the active ones.
    pub fn list(&self, active_only: bool) -> Vec<Monitor> {
        let inner = self.inner.read();
        inner
            .order
            .iter()
            .filter_map(|id| inner.monitors.get(id))
            .filter(|m| !active_only || m.active)
            .cloned()
            .collect()
    }

    /// Monitors delivering to `contact`, active or not.
    pub fn for_contact(&self, contact: &str) -> Vec<Monitor> {
        let contact = contact.trim();
        self.list(false)
            .into_iter()
            .filter(|m| m.contact == contact)
            .collect()
    }

    pub fn set_active(&self, id: &MonitorId, active: bool) -> Result<Monitor> {
        let mut inner = self.inner.write();
        let m = inner
            .monitors
            .get_mut(id)
            .ok_or_else(|| MonitorError::NotFound(id.to_string()))?;
        m.active = active;
        info!(target: "monitor", monitor_id = %id, active, "monitor activity changed");
        Ok(m.clone())
    }

    /// Mark `id` as checked at `now` and remember `new_fingerprints`.
    ///
    /// `last_checked` never moves backwards. Both updates land together.
    pub fn touch<I>(&self, id: &MonitorId, now: DateTime<Utc>, new_fingerprints: I) -> Result<TouchOutcome>
    where
        I: IntoIterator<Item = Fingerprint>,
    {
        let mut inner = self.inner.write();
        let m = inner
            .monitors
            .get_mut(id)
            .ok_or_else(|| MonitorError::NotFound(id.to_string()))?;

        let before = m.seen_fingerprints.len();
        let evicted = m.seen_fingerprints.extend(new_fingerprints);
        let added = m.seen_fingerprints.len() + evicted - before;
        m.last_checked = Some(match m.last_checked {
            Some(prev) if prev > now => prev,
            _ => now,
        });

        debug!(target: "monitor", monitor_id = %id, added, evicted, "monitor touched");
        Ok(TouchOutcome { added, evicted })
    }

    /// Active monitors never checked or whose interval has elapsed, in insertion order.
    pub fn due_for_check(&self, now: DateTime<Utc>) -> Vec<Monitor> {
        let inner = self.inner.read();
        inner
            .order
            .iter()
            .filter_map(|id| inner.monitors.get(id))
            .filter(|m| m.is_due(now))
            .cloned()
            .collect()
    }

    /// Everything, in insertion order; the persisted state layout.
    pub fn snapshot(&self) -> Vec<Monitor> {
        self.list(false)
    }

    pub fn len(&self) -> usize {
        self.inner.read().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finding::RawFinding;
    use crate::monitor::MAX_FREQUENCY_SECS;
    use crate::fingerprint::fingerprint;
    use chrono::TimeZone;
    use serde_json::json;

    fn job_params() -> Parameters {
        serde_json::from_value(json!({"companies": ["Acme"], "keywords": ["AI"]})).unwrap()
    }

    fn t(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 6, h, 0, 0).unwrap()
    }

    fn fp(title: &str) -> Fingerprint {
        let raw = RawFinding::from_pairs([("company", "Acme"), ("title", title)]);
        fingerprint(MonitorKind::JobPostings, &raw.fields)
    }

    #[test]
    fn create_sets_initial_state() {
        let reg = MonitorRegistry::default();
        let m = reg
            .create(MonitorKind::JobPostings, job_params(), "+1555", Duration::from_secs(3600))
            .unwrap();
        assert!(m.active);
        assert!(m.last_checked.is_none());
        assert!(m.seen_fingerprints.is_empty());
        assert_eq!(reg.get(&m.id), Some(m));
    }

    #[test]
    fn invalid_create_registers_nothing() {
        let reg = MonitorRegistry::default();
        let err = reg
            .create(MonitorKind::JobPostings, Parameters::new(), "+1555", Duration::from_secs(60))
            .unwrap_err();
        assert!(matches!(err, MonitorError::InvalidParameters(_)));
        let err = reg
            .create(MonitorKind::JobPostings, job_params(), "  ", Duration::from_secs(60))
            .unwrap_err();
        assert!(matches!(err, MonitorError::InvalidParameters(_)));
        assert!(reg.is_empty());
    }

    #[test]
    fn out_of_range_frequency_is_rejected() {
        let reg = MonitorRegistry::default();
        for secs in [0, MAX_FREQUENCY_SECS + 1, 10_000_000_000_000_000, u64::MAX] {
            let err = reg
                .create(MonitorKind::JobPostings, job_params(), "c", Duration::from_secs(secs))
                .unwrap_err();
            assert!(matches!(err, MonitorError::InvalidParameters(_)), "{secs}");
        }
        assert!(reg.is_empty());

        let m = reg
            .create(
                MonitorKind::JobPostings,
                job_params(),
                "c",
                Duration::from_secs(MAX_FREQUENCY_SECS),
            )
            .unwrap();
        reg.touch(&m.id, t(9), Vec::new()).unwrap();
        assert!(reg.due_for_check(t(10)).is_empty());
    }

    #[test]
    fn due_for_check_respects_frequency_and_activity() {
        let reg = MonitorRegistry::default();
        let hourly = Duration::from_secs(3600);
        let a = reg.create(MonitorKind::JobPostings, job_params(), "c", hourly).unwrap();
        let b = reg.create(MonitorKind::JobPostings, job_params(), "c", hourly).unwrap();
        let c = reg.create(MonitorKind::JobPostings, job_params(), "c", hourly).unwrap();

        let ids = |v: Vec<Monitor>| v.into_iter().map(|m| m.id).collect::<Vec<_>>();
        assert_eq!(ids(reg.due_for_check(t(9))), vec![a.id.clone(), b.id.clone(), c.id.clone()]);

        reg.touch(&a.id, t(9), Vec::new()).unwrap();
        reg.set_active(&b.id, false).unwrap();
        assert_eq!(ids(reg.due_for_check(t(9))), vec![c.id.clone()]);

        // Exactly one interval later `a` qualifies again.
        assert_eq!(ids(reg.due_for_check(t(10))), vec![a.id.clone(), c.id.clone()]);
        assert_eq!(reg.list(true).len(), 2);
        assert_eq!(reg.list(false).len(), 3);
    }

    #[test]
    fn touch_unions_and_never_rewinds() {
        let reg = MonitorRegistry::new(2);
        let m = reg
            .create(MonitorKind::JobPostings, job_params(), "c", Duration::from_secs(60))
            .unwrap();

        let out = reg.touch(&m.id, t(10), vec![fp("a"), fp("b")]).unwrap();
        assert_eq!(out, TouchOutcome { added: 2, evicted: 0 });

        let out = reg.touch(&m.id, t(9), vec![fp("b"), fp("c")]).unwrap();
        assert_eq!(out, TouchOutcome { added: 1, evicted: 1 });

        let m = reg.get(&m.id).unwrap();
        assert_eq!(m.last_checked, Some(t(10)));
        assert!(!m.seen_fingerprints.contains(&fp("a")));
        assert!(m.seen_fingerprints.contains(&fp("c")));
    }

    #[test]
    fn unknown_ids_are_not_found() {
        let reg = MonitorRegistry::default();
        let id = MonitorId::from("job_monitor_missing");
        assert!(matches!(reg.set_active(&id, false), Err(MonitorError::NotFound(_))));
        assert!(matches!(reg.touch(&id, t(1), Vec::new()), Err(MonitorError::NotFound(_))));
    }

    #[test]
    fn restore_keeps_order() {
        let reg = MonitorRegistry::default();
        for _ in 0..3 {
            reg.create(MonitorKind::JobPostings, job_params(), "c", Duration::from_secs(60))
                .unwrap();
        }
        let snap = reg.snapshot();
        let back = MonitorRegistry::restore(500, snap.clone());
        assert_eq!(back.snapshot(), snap);
    }
}
