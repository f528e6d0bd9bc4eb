// src/fingerprint.rs
//! Stable identity keys for findings.
//!
//! A fingerprint is a sha256 over the kind-specific identity fields after
//! normalization (lowercase, trimmed, whitespace runs collapsed):
//! - job postings: company + url, or company + title when no url is given
//! - research publications: title + first author (title alone without authors)
//! - industry news: headline + source
//!
//! Anything outside those fields (location, summary, relevance, ...) does not
//! influence the key, so the same real-world event re-reported with different
//! surrounding text is recognised as already seen.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::finding::{field_str, Fields};
use crate::monitor::MonitorKind;

const SEP: char = '\u{1f}';

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lowercase, trim, collapse whitespace runs to one space. Every other
/// character, brackets included, is identity.
pub fn normalize(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Derive the identity key of a finding of `kind` from its fields.
pub fn fingerprint(kind: MonitorKind, fields: &Fields) -> Fingerprint {
    let norm = |key: &str| field_str(fields, key).map(normalize).unwrap_or_default();

    let parts: Vec<String> = match kind {
        MonitorKind::JobPostings => {
            let company = norm("company");
            match field_str(fields, "url") {
                Some(url) => vec!["job".into(), company, "url".into(), normalize(url)],
                None => vec!["job".into(), company, "title".into(), norm("title")],
            }
        }
        MonitorKind::ResearchPublications => {
            let mut parts = vec!["paper".into(), norm("title")];
            if let Some(author) = first_author(fields) {
                parts.push(normalize(&author));
            }
            parts
        }
        MonitorKind::IndustryNews => vec!["news".into(), norm("headline"), norm("source")],
    };

    let mut hasher = Sha256::new();
    for (i, p) in parts.iter().enumerate() {
        if i > 0 {
            let mut buf = [0u8; 4];
            hasher.update(SEP.encode_utf8(&mut buf).as_bytes());
        }
        hasher.update(p.as_bytes());
    }
    Fingerprint(hex(&hasher.finalize()))
}

/// `authors` may be an array or a comma-separated string; `author` and
/// `first_author` are accepted as single-valued spellings.
fn first_author(fields: &Fields) -> Option<String> {
    match fields.get("authors") {
        Some(Value::Array(items)) => {
            if let Some(a) = items
                .iter()
                .filter_map(Value::as_str)
                .find(|s| !s.trim().is_empty())
            {
                return Some(a.to_string());
            }
        }
        Some(Value::String(s)) => {
            if let Some(a) = s.split(',').map(str::trim).find(|s| !s.is_empty()) {
                return Some(a.to_string());
            }
        }
        _ => {}
    }
    field_str(fields, "first_author")
        .or_else(|| field_str(fields, "author"))
        .map(str::to_string)
}

fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Short, non-reversible id for log lines (contacts are never logged raw).
pub(crate) fn anon_hash(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    hex(&digest[..6])
}
