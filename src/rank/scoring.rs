//! Weighted multi-criteria scoring.
//!
//! `total = Σ value(c) * weight(c)` over the criteria an item supplies, where
//! `value(effort) = 10 - effort` (less effort scores higher) and every other
//! criterion contributes its raw value. Inputs are clamped to [0,10] and the
//! total is rounded to 2 decimals before bucketing.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{Criterion, Weights};
use crate::finding::Priority;

/// Strictly above this is HIGH.
pub const HIGH_THRESHOLD: f64 = 8.5;
/// Strictly above this (and not HIGH) is MEDIUM.
pub const MEDIUM_THRESHOLD: f64 = 7.0;

/// Per-criterion values on a 0..10 scale; absent criteria are not scored.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CriteriaScores {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urgency: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effort: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feasibility: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alignment: Option<f64>,
}

impl CriteriaScores {
    pub fn get(&self, c: Criterion) -> Option<f64> {
        match c {
            Criterion::Impact => self.impact,
            Criterion::Urgency => self.urgency,
            Criterion::Effort => self.effort,
            Criterion::Feasibility => self.feasibility,
            Criterion::Alignment => self.alignment,
        }
    }

    pub fn set(&mut self, c: Criterion, v: f64) {
        let slot = match c {
            Criterion::Impact => &mut self.impact,
            Criterion::Urgency => &mut self.urgency,
            Criterion::Effort => &mut self.effort,
            Criterion::Feasibility => &mut self.feasibility,
            Criterion::Alignment => &mut self.alignment,
        };
        *slot = Some(v);
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub score: f64,
    /// Weighted contribution per scored criterion.
    pub components: BTreeMap<String, f64>,
}

pub fn score(criteria: &CriteriaScores, weights: &Weights) -> ScoreBreakdown {
    let mut total = 0.0;
    let mut components = BTreeMap::new();
    for c in Criterion::ALL {
        let Some(raw) = criteria.get(c).filter(|v| v.is_finite()) else {
            continue;
        };
        let v = raw.clamp(0.0, 10.0);
        let value = if c == Criterion::Effort { 10.0 - v } else { v };
        let contribution = value * weights.get(c);
        total += contribution;
        components.insert(c.as_str().to_string(), round2(contribution));
    }
    ScoreBreakdown {
        score: round2(total),
        components,
    }
}

/// Fixed thresholds with strict `>`: 8.5 is MEDIUM, 7.0 is LOW.
pub fn bucket(score: f64) -> Priority {
    if score > HIGH_THRESHOLD {
        Priority::High
    } else if score > MEDIUM_THRESHOLD {
        Priority::Medium
    } else {
        Priority::Low
    }
}

pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
