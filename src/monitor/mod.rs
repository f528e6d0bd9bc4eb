// src/monitor/mod.rs
//! Monitor definitions: what is watched, for whom, and how often.

pub mod registry;
pub mod seen;

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{MonitorError, Result};
pub use registry::MonitorRegistry;
pub use seen::{SeenFingerprints, DEFAULT_SEEN_CAPACITY};

/// Longest accepted check interval: ten years.
pub const MAX_FREQUENCY_SECS: u64 = 10 * 365 * 86_400;

/// Kind-specific parameters; passed through to the source provider untouched.
pub type Parameters = BTreeMap<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorKind {
    JobPostings,
    ResearchPublications,
    IndustryNews,
}

impl MonitorKind {
    pub const ALL: [MonitorKind; 3] = [
        MonitorKind::JobPostings,
        MonitorKind::ResearchPublications,
        MonitorKind::IndustryNews,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MonitorKind::JobPostings => "job_postings",
            MonitorKind::ResearchPublications => "research_publications",
            MonitorKind::IndustryNews => "industry_news",
        }
    }

    fn id_prefix(&self) -> &'static str {
        match self {
            MonitorKind::JobPostings => "job_monitor",
            MonitorKind::ResearchPublications => "research_monitor",
            MonitorKind::IndustryNews => "news_monitor",
        }
    }
}

impl std::fmt::Display for MonitorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MonitorId(String);

impl MonitorId {
    /// Random, collision-free under concurrent creation.
    pub fn generate(kind: MonitorKind) -> Self {
        MonitorId(format!("{}_{}", kind.id_prefix(), uuid::Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for MonitorId {
    fn from(s: &str) -> Self {
        MonitorId(s.to_string())
    }
}

impl std::fmt::Display for MonitorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Monitor {
    pub id: MonitorId,
    pub kind: MonitorKind,
    pub parameters: Parameters,
    pub contact: String,
    /// Minimum interval between checks, in seconds.
    pub frequency_secs: u64,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub last_checked: Option<DateTime<Utc>>,
    #[serde(default)]
    pub seen_fingerprints: SeenFingerprints,
}

impl Monitor {
    pub fn frequency(&self) -> Duration {
        Duration::from_secs(self.frequency_secs)
    }

    /// Active and never checked, or checked at least `frequency` ago.
    /// An interval chrono cannot represent never elapses.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        if !self.active {
            return false;
        }
        match self.last_checked {
            None => true,
            Some(last) => i64::try_from(self.frequency_secs)
                .ok()
                .and_then(chrono::Duration::try_seconds)
                .is_some_and(|freq| now.signed_duration_since(last) >= freq),
        }
    }
}

/// Parse `hourly` / `daily` / `weekly` / `monthly` or a positive number of seconds.
pub fn parse_frequency(s: &str) -> Result<Duration> {
    let secs = match s.trim().to_ascii_lowercase().as_str() {
        "hourly" => 3_600,
        "daily" => 86_400,
        "weekly" => 7 * 86_400,
        "monthly" => 30 * 86_400,
        other => other
            .parse::<u64>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| MonitorError::invalid(format!("unsupported frequency '{s}'")))?,
    };
    check_frequency(Duration::from_secs(secs))
}

/// At least one second and at most [`MAX_FREQUENCY_SECS`].
pub fn check_frequency(frequency: Duration) -> Result<Duration> {
    match frequency.as_secs() {
        0 => Err(MonitorError::invalid("frequency must be at least one second")),
        secs if secs > MAX_FREQUENCY_SECS => Err(MonitorError::invalid(format!(
            "frequency must not exceed {MAX_FREQUENCY_SECS} seconds"
        ))),
        _ => Ok(frequency),
    }
}

/// Reject parameters lacking the fields a kind needs.
pub fn validate_parameters(kind: MonitorKind, params: &Parameters) -> Result<()> {
    match kind {
        MonitorKind::JobPostings => {
            require_list(params, "companies")?;
            require_list(params, "keywords")?;
        }
        MonitorKind::ResearchPublications => {
            require_list(params, "topics")?;
            if let Some(v) = params.get("min_relevance") {
                let ok = v
                    .as_str()
                    .map(|s| matches!(s.to_ascii_lowercase().as_str(), "low" | "medium" | "high"))
                    .unwrap_or(false);
                if !ok {
                    return Err(MonitorError::invalid(
                        "min_relevance must be one of low, medium, high",
                    ));
                }
            }
        }
        MonitorKind::IndustryNews => {
            let industry = params
                .get("industry")
                .and_then(Value::as_str)
                .map(str::trim)
                .unwrap_or_default();
            if industry.is_empty() {
                return Err(MonitorError::invalid("industry is required"));
            }
            require_list(params, "keywords")?;
        }
    }
    Ok(())
}

fn require_list(params: &Parameters, key: &str) -> Result<()> {
    let items = string_list(params, key);
    if items.is_empty() {
        return Err(MonitorError::invalid(format!(
            "{key} must be a non-empty list of strings"
        )));
    }
    Ok(())
}

/// Non-blank strings of an array parameter; anything else yields an empty list.
pub fn string_list(params: &Parameters, key: &str) -> Vec<String> {
    params
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
