//! Criterion weights, with hot-reload from a JSON file (default `config/weights.json`).
//!
//! JSON shape (every key optional, missing keys keep their default):
//! {
//!   "impact": 0.3,
//!   "urgency": 0.25,
//!   "effort": 0.2,
//!   "feasibility": 0.15,
//!   "alignment": 0.1
//! }
//!
//! On each `current()` call we check the file's modified time and reload if changed.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::{
    fs, io,
    path::{Path, PathBuf},
    time::SystemTime,
};

use super::Criterion;

pub const DEFAULT_WEIGHTS_PATH: &str = "config/weights.json";

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Weights {
    pub impact: f64,
    pub urgency: f64,
    pub effort: f64,
    pub feasibility: f64,
    pub alignment: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            impact: 0.3,
            urgency: 0.25,
            effort: 0.2,
            feasibility: 0.15,
            alignment: 0.1,
        }
    }
}

impl Weights {
    pub fn get(&self, c: Criterion) -> f64 {
        match c {
            Criterion::Impact => self.impact,
            Criterion::Urgency => self.urgency,
            Criterion::Effort => self.effort,
            Criterion::Feasibility => self.feasibility,
            Criterion::Alignment => self.alignment,
        }
    }
}

/// Hot-reload wrapper: reloads when the config file mtime changes.
/// Without a path it always serves the weights it was built with.
#[derive(Debug)]
pub struct HotReloadWeights {
    path: Option<PathBuf>,
    inner: RwLock<State>,
}

#[derive(Debug)]
struct State {
    weights: Weights,
    last_modified: Option<SystemTime>,
}

impl HotReloadWeights {
    /// Watch `path`, or `config/weights.json` if `None`.
    pub fn new(path: Option<&Path>) -> Self {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_WEIGHTS_PATH));
        Self {
            path: Some(path),
            inner: RwLock::new(State {
                weights: Weights::default(),
                last_modified: None,
            }),
        }
    }

    /// Never touches the filesystem.
    pub fn fixed(weights: Weights) -> Self {
        Self {
            path: None,
            inner: RwLock::new(State {
                weights,
                last_modified: None,
            }),
        }
    }

    /// Get the latest weights, reloading if the config file changed.
    pub fn current(&self) -> Weights {
        let Some(path) = self.path.as_deref() else {
            return self.inner.read().weights;
        };

        // If the file isn't there, we keep what we have.
        let Ok(mtime) = fs::metadata(path).and_then(|m| m.modified()) else {
            return self.inner.read().weights;
        };

        {
            let guard = self.inner.read();
            if guard.last_modified == Some(mtime) {
                return guard.weights;
            }
        }

        let mut guard = self.inner.write();
        // Double-check in case of races.
        if guard.last_modified != Some(mtime) {
            match load_weights_file(path) {
                Ok(w) => {
                    tracing::info!(target: "rank", path = %path.display(), "weights reloaded");
                    guard.weights = w;
                }
                Err(e) => {
                    tracing::warn!(target: "rank", path = %path.display(), error = %e, "weights file rejected");
                }
            }
            guard.last_modified = Some(mtime);
        }
        guard.weights
    }
}

/// Load weights directly (no caching). Public for tests/tools.
pub fn load_weights_file(path: &Path) -> io::Result<Weights> {
    let bytes = fs::read(path)?;
    let w: Weights = serde_json::from_slice(&bytes)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    Ok(w)
}
