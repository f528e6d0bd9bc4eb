// src/lib.rs
// Public library surface for integration tests and the binaries.

pub mod api;
pub mod compose;
pub mod config;
pub mod error;
pub mod finding;
pub mod fingerprint;
pub mod history;
pub mod metrics;
pub mod monitor;
pub mod notify;
pub mod rank;
pub mod scheduler;
pub mod source;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::api::{router, AppState};
pub use crate::compose::{compose_alert, compose_digest, Alert, Digest, DigestWindow};
pub use crate::error::{MonitorError, Result};
pub use crate::finding::{Finding, Priority, RawFinding};
pub use crate::fingerprint::{fingerprint, Fingerprint};
pub use crate::monitor::{Monitor, MonitorId, MonitorKind, MonitorRegistry};
pub use crate::scheduler::{spawn_cycle_driver, CheckScheduler, CycleReport};
pub use crate::source::SourceProvider;
