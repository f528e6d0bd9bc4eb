// src/source/mod.rs
//! Source providers: where candidate findings come from.
//!
//! The scheduler only sees the [`SourceProvider`] trait; transports live
//! behind it.

pub mod fixture;
pub mod http_feed;

use anyhow::Result;

use crate::finding::RawFinding;
use crate::monitor::{MonitorKind, Parameters};

pub use fixture::FixtureProvider;
pub use http_feed::HttpFeedProvider;

#[async_trait::async_trait]
pub trait SourceProvider: Send + Sync {
    /// Current candidate findings for a monitor of `kind` with `parameters`.
    /// Implementations bound their own latency (timeouts).
    async fn fetch(&self, kind: MonitorKind, parameters: &Parameters) -> Result<Vec<RawFinding>>;
    fn name(&self) -> &'static str;
}
