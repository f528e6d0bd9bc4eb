// src/error.rs
use thiserror::Error;

/// Errors surfaced by the registry, the store and the management surface.
///
/// Provider failures are deliberately absent: they are recovered per monitor
/// inside a cycle and reported as [`crate::scheduler::CheckFailure`] entries.
#[derive(Error, Debug)]
pub enum MonitorError {
    /// Monitor creation rejected; nothing was registered.
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("monitor not found: {0}")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MonitorError>;

impl MonitorError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        MonitorError::InvalidParameters(msg.into())
    }
}
