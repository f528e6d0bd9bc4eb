//! Priority Ranker: weighted scoring shared by finding prioritization and
//! ad-hoc task ranking.

pub mod scoring;
pub mod weights;

use serde::{Deserialize, Serialize};

use crate::finding::{field_f64, field_str, Fields, Priority};
use crate::fingerprint::normalize;
use crate::monitor::{string_list, MonitorKind, Parameters};
pub use scoring::{bucket, score, CriteriaScores, ScoreBreakdown, HIGH_THRESHOLD, MEDIUM_THRESHOLD};
pub use weights::{HotReloadWeights, Weights};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Criterion {
    Impact,
    Urgency,
    Effort,
    Feasibility,
    Alignment,
}

impl Criterion {
    pub const ALL: [Criterion; 5] = [
        Criterion::Impact,
        Criterion::Urgency,
        Criterion::Effort,
        Criterion::Feasibility,
        Criterion::Alignment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Criterion::Impact => "impact",
            Criterion::Urgency => "urgency",
            Criterion::Effort => "effort",
            Criterion::Feasibility => "feasibility",
            Criterion::Alignment => "alignment",
        }
    }
}

/// One ranked entry; `rank` is 1-based.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ranked<T> {
    pub rank: usize,
    pub score: f64,
    pub priority: Priority,
    pub components: std::collections::BTreeMap<String, f64>,
    pub item: T,
}

/// Score every item, stable-sort by score descending (ties keep input
/// order), then number ranks 1..N.
pub fn rank_by<T, F>(items: Vec<T>, weights: &Weights, criteria_of: F) -> Vec<Ranked<T>>
where
    F: Fn(&T) -> CriteriaScores,
{
    let mut ranked: Vec<Ranked<T>> = items
        .into_iter()
        .map(|item| {
            let out = score(&criteria_of(&item), weights);
            Ranked {
                rank: 0,
                score: out.score,
                priority: bucket(out.score),
                components: out.components,
                item,
            }
        })
        .collect();
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    for (i, r) in ranked.iter_mut().enumerate() {
        r.rank = i + 1;
    }
    ranked
}

/// A task for the ranking tool: a name plus its raw criterion values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskItem {
    pub name: String,
    #[serde(flatten)]
    pub criteria: CriteriaScores,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingSummary {
    pub total: usize,
    pub top_priority_count: usize,
    /// Effort below 3 and score above 7.
    pub quick_wins: Vec<String>,
    /// Impact above 8.
    pub high_impact: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRanking {
    pub ranked_items: Vec<Ranked<TaskItem>>,
    pub summary: RankingSummary,
}

/// Rank tasks with caller weights (missing weights already defaulted).
pub fn rank_items(items: Vec<TaskItem>, weights: &Weights) -> TaskRanking {
    let ranked_items = rank_by(items, weights, |t| t.criteria);
    let summary = RankingSummary {
        total: ranked_items.len(),
        top_priority_count: ranked_items
            .iter()
            .filter(|r| r.priority == Priority::High)
            .count(),
        quick_wins: ranked_items
            .iter()
            .filter(|r| r.item.criteria.effort.is_some_and(|e| e < 3.0) && r.score > 7.0)
            .map(|r| r.item.name.clone())
            .collect(),
        high_impact: ranked_items
            .iter()
            .filter(|r| r.item.criteria.impact.is_some_and(|i| i > 8.0))
            .map(|r| r.item.name.clone())
            .collect(),
    };
    TaskRanking {
        ranked_items,
        summary,
    }
}

/// Criterion values for a finding.
///
/// Numeric `impact`/`urgency`/`effort`/`feasibility`/`alignment` fields given
/// by the provider win; the rest is derived from the kind-specific fields and
/// the monitor's parameters.
pub fn criteria_for_finding(kind: MonitorKind, fields: &Fields, params: &Parameters) -> CriteriaScores {
    let mut c = match kind {
        MonitorKind::JobPostings => {
            let title = field_str(fields, "title").map(normalize).unwrap_or_default();
            let company = field_str(fields, "company").map(normalize).unwrap_or_default();
            let keyword_hit = mentions_any(&title, &string_list(params, "keywords"));
            let tracked = string_list(params, "companies")
                .iter()
                .any(|c| normalize(c) == company);
            CriteriaScores {
                impact: Some(if keyword_hit { 10.0 } else { 6.0 }),
                urgency: Some(9.0),
                effort: Some(2.0),
                feasibility: Some(8.0),
                alignment: Some(if tracked { 10.0 } else { 5.0 }),
            }
        }
        MonitorKind::ResearchPublications => {
            let r = field_f64(fields, "relevance")
                .or_else(|| field_f64(fields, "relevance_score"))
                .map(|r| if r <= 1.0 { r * 10.0 } else { r })
                .unwrap_or(5.0)
                .clamp(0.0, 10.0);
            CriteriaScores {
                impact: Some(r),
                urgency: Some(r),
                effort: Some(4.0),
                feasibility: Some(8.0),
                alignment: Some(r),
            }
        }
        MonitorKind::IndustryNews => {
            let (impact, urgency) = match field_str(fields, "significance")
                .map(|s| s.trim().to_ascii_uppercase())
                .as_deref()
            {
                Some("HIGH") => (10.0, 9.0),
                Some("LOW") => (4.0, 4.0),
                _ => (7.0, 7.0),
            };
            let headline = field_str(fields, "headline").map(normalize).unwrap_or_default();
            let keyword_hit = mentions_any(&headline, &string_list(params, "keywords"));
            CriteriaScores {
                impact: Some(impact),
                urgency: Some(urgency),
                effort: Some(3.0),
                feasibility: Some(8.0),
                alignment: Some(if keyword_hit { 8.0 } else { 5.0 }),
            }
        }
    };

    for crit in Criterion::ALL {
        if let Some(v) = field_f64(fields, crit.as_str()) {
            c.set(crit, v);
        }
    }
    c
}

/// Whole-word match, so "AI" does not hit "email".
fn mentions_any(haystack: &str, needles: &[String]) -> bool {
    let padded = format!(" {} ", words(haystack));
    needles
        .iter()
        .map(|n| words(n))
        .any(|n| !n.is_empty() && padded.contains(&format!(" {n} ")))
}

fn words(s: &str) -> String {
    s.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
