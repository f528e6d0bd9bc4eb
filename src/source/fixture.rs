// src/source/fixture.rs
use std::collections::HashMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::RwLock;

use super::SourceProvider;
use crate::finding::RawFinding;
use crate::monitor::{MonitorKind, Parameters};

/// Serves a fixed list of findings per kind, ignoring parameters.
/// Contents can be swapped between cycles (tests, demo).
#[derive(Debug, Default)]
pub struct FixtureProvider {
    by_kind: RwLock<HashMap<MonitorKind, Vec<RawFinding>>>,
}

impl FixtureProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// JSON object keyed by kind: `{"job_postings": [{...}], "industry_news": [...]}`.
    pub fn from_json(content: &str) -> Result<Self> {
        let by_kind: HashMap<MonitorKind, Vec<RawFinding>> =
            serde_json::from_str(content).context("parsing fixture findings")?;
        Ok(Self {
            by_kind: RwLock::new(by_kind),
        })
    }

    pub fn with(self, kind: MonitorKind, items: Vec<RawFinding>) -> Self {
        self.set(kind, items);
        self
    }

    pub fn set(&self, kind: MonitorKind, items: Vec<RawFinding>) {
        self.by_kind.write().insert(kind, items);
    }
}

#[async_trait]
impl SourceProvider for FixtureProvider {
    async fn fetch(&self, kind: MonitorKind, _parameters: &Parameters) -> Result<Vec<RawFinding>> {
        Ok(self.by_kind.read().get(&kind).cloned().unwrap_or_default())
    }

    fn name(&self) -> &'static str {
        "fixture"
    }
}
