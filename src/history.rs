//! Bounded in-memory log of generated alerts; digests read from it.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::compose::Alert;
use crate::monitor::MonitorId;

pub const DEFAULT_ALERT_LOG_CAPACITY: usize = 2000;

#[derive(Debug)]
pub struct AlertLog {
    inner: Mutex<Vec<Alert>>,
    cap: usize,
}

impl Default for AlertLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_ALERT_LOG_CAPACITY)
    }
}

impl AlertLog {
    pub fn with_capacity(cap: usize) -> Self {
        let cap = cap.clamp(1, 100_000);
        Self {
            inner: Mutex::new(Vec::with_capacity(cap.min(10_000))),
            cap,
        }
    }

    /// Append; the oldest alerts are dropped beyond capacity.
    pub fn push(&self, alert: Alert) {
        let mut v = self.inner.lock();
        v.push(alert);
        if v.len() > self.cap {
            let excess = v.len() - self.cap;
            v.drain(0..excess);
        }
    }

    /// Alerts of `monitors` generated within `[start, end]`, oldest first.
    pub fn in_window(
        &self,
        monitors: &[MonitorId],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<Alert> {
        let v = self.inner.lock();
        v.iter()
            .filter(|a| a.generated_at >= start && a.generated_at <= end)
            .filter(|a| monitors.contains(&a.monitor_id))
            .cloned()
            .collect()
    }

    pub fn snapshot_last_n(&self, n: usize) -> Vec<Alert> {
        let v = self.inner.lock();
        let start = v.len().saturating_sub(n);
        v[start..].to_vec()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
