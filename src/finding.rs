// src/finding.rs
//! Findings: candidate items returned by a source check, and their ranked form.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::fingerprint::Fingerprint;
use crate::monitor::{MonitorId, MonitorKind};

/// Kind-specific key/value payload (title/company/url, title/topic/relevance,
/// headline/source/significance, ...).
pub type Fields = BTreeMap<String, Value>;

/// Priority tier assigned by the ranker. Ordered `Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "HIGH",
            Priority::Medium => "MEDIUM",
            Priority::Low => "LOW",
        }
    }
}

/// What a [`crate::source::SourceProvider`] hands back: the fields plus an
/// optional discovery time (the check time is used when absent).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawFinding {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discovered_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub fields: Fields,
}

impl RawFinding {
    pub fn new(fields: Fields) -> Self {
        Self {
            discovered_at: None,
            fields,
        }
    }

    /// Convenience builder for string-only payloads.
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let fields = pairs
            .into_iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect();
        Self::new(fields)
    }

    pub fn with_field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    pub fn discovered(mut self, at: DateTime<Utc>) -> Self {
        self.discovered_at = Some(at);
        self
    }
}

/// A new (not previously seen) finding, fingerprinted and ranked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub monitor_id: MonitorId,
    pub kind: MonitorKind,
    pub fields: Fields,
    pub discovered_at: DateTime<Utc>,
    pub fingerprint: Fingerprint,
    pub priority: Priority,
    pub score: f64,
}

impl Finding {
    /// Human-facing headline for notifications and logs.
    pub fn headline(&self) -> String {
        let key = match self.kind {
            MonitorKind::IndustryNews => "headline",
            _ => "title",
        };
        field_str(&self.fields, key).unwrap_or("(untitled)").to_string()
    }
}

/// String field lookup; empty or whitespace-only strings count as missing.
pub fn field_str<'a>(fields: &'a Fields, key: &str) -> Option<&'a str> {
    fields
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

/// Numeric field lookup that also accepts numeric strings.
pub fn field_f64(fields: &Fields, key: &str) -> Option<f64> {
    match fields.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}
