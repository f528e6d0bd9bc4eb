// src/monitor/seen.rs
//! Bounded dedup memory of one monitor.
//!
//! Holds at most `capacity` fingerprints; when full, the oldest-inserted one
//! is evicted. An evicted fingerprint is forgotten, so if the same item is
//! reported again much later it is treated as new and alerted a second time.
//! That is the price of keeping long-lived monitors at constant memory.

use std::collections::{HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::fingerprint::Fingerprint;

pub const DEFAULT_SEEN_CAPACITY: usize = 500;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "SeenRepr", into = "SeenRepr")]
pub struct SeenFingerprints {
    capacity: usize,
    order: VecDeque<Fingerprint>,
    index: HashSet<Fingerprint>,
}

/// Persisted shape: capacity plus fingerprints, oldest first.
#[derive(Serialize, Deserialize)]
struct SeenRepr {
    capacity: usize,
    fingerprints: Vec<Fingerprint>,
}

impl From<SeenRepr> for SeenFingerprints {
    fn from(r: SeenRepr) -> Self {
        let mut s = SeenFingerprints::with_capacity(r.capacity);
        s.extend(r.fingerprints);
        s
    }
}

impl From<SeenFingerprints> for SeenRepr {
    fn from(s: SeenFingerprints) -> Self {
        SeenRepr {
            capacity: s.capacity,
            fingerprints: s.order.into_iter().collect(),
        }
    }
}

impl Default for SeenFingerprints {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_SEEN_CAPACITY)
    }
}

impl SeenFingerprints {
    /// `capacity` of 0 is treated as 1.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity.min(1024)),
            index: HashSet::with_capacity(capacity.min(1024)),
        }
    }

    pub fn contains(&self, fp: &Fingerprint) -> bool {
        self.index.contains(fp)
    }

    /// Remember `fp`. Re-inserting a known fingerprint does not refresh its
    /// position. Returns the evicted fingerprint, if any.
    pub fn insert(&mut self, fp: Fingerprint) -> Option<Fingerprint> {
        if self.index.contains(&fp) {
            return None;
        }
        self.index.insert(fp.clone());
        self.order.push_back(fp);
        if self.order.len() > self.capacity {
            let old = self.order.pop_front()?;
            self.index.remove(&old);
            return Some(old);
        }
        None
    }

    /// Insert all, returning how many old entries were evicted.
    pub fn extend<I: IntoIterator<Item = Fingerprint>>(&mut self, fps: I) -> usize {
        fps.into_iter()
            .filter_map(|fp| self.insert(fp))
            .count()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Fingerprint> {
        self.order.iter()
    }
}
