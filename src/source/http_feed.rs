// src/source/http_feed.rs
use std::collections::HashMap;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use metrics::histogram;
use reqwest::Client;
use serde::Deserialize;

use super::SourceProvider;
use crate::finding::RawFinding;
use crate::monitor::{MonitorKind, Parameters};

/// Pulls findings from one JSON feed endpoint per kind.
///
/// Request: `GET {url}?kind=<kind>&params=<monitor parameters as JSON>`.
/// Response: either a bare array of findings or `{"items": [...]}`
/// (optionally wrapped once more in `{"data": ...}`).
pub struct HttpFeedProvider {
    feeds: HashMap<MonitorKind, String>,
    client: Client,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FeedBody {
    Bare(Vec<RawFinding>),
    Items { items: Vec<RawFinding> },
    Wrapped { data: Box<FeedBody> },
}

impl FeedBody {
    fn into_items(self) -> Vec<RawFinding> {
        match self {
            FeedBody::Bare(v) => v,
            FeedBody::Items { items } => items,
            FeedBody::Wrapped { data } => data.into_items(),
        }
    }
}

impl HttpFeedProvider {
    pub fn new(feeds: HashMap<MonitorKind, String>) -> Self {
        Self {
            feeds,
            client: Client::new(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs.max(1));
        self
    }
}

pub(crate) fn parse_feed(body: &str) -> Result<Vec<RawFinding>> {
    let trimmed = body.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Vec::new());
    }
    let parsed: FeedBody = serde_json::from_str(trimmed).context("parse feed JSON")?;
    Ok(parsed.into_items())
}

#[async_trait]
impl SourceProvider for HttpFeedProvider {
    async fn fetch(&self, kind: MonitorKind, parameters: &Parameters) -> Result<Vec<RawFinding>> {
        let url = self
            .feeds
            .get(&kind)
            .ok_or_else(|| anyhow!("no feed configured for {kind}"))?;
        let params = serde_json::to_string(parameters).context("encode parameters")?;

        let t0 = Instant::now();
        let resp = self
            .client
            .get(url)
            .timeout(self.timeout)
            .query(&[("kind", kind.as_str()), ("params", params.as_str())])
            .send()
            .await
            .with_context(|| format!("fetch {kind} feed"))?
            .error_for_status()
            .with_context(|| format!("{kind} feed non-2xx"))?;
        let body = resp.text().await.context("read feed body")?;
        histogram!("source_fetch_ms", "kind" => kind.as_str()).record(t0.elapsed().as_millis() as f64);

        parse_feed(&body)
    }

    fn name(&self) -> &'static str {
        "http_feed"
    }
}
