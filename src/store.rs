// src/store.rs
//! Durable registry snapshot: one pretty JSON document holding every monitor
//! (definition, activity, last check, dedup memory oldest-first).

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::Mutex;

use crate::error::Result;
use crate::monitor::{Monitor, MonitorRegistry};

pub const DEFAULT_STATE_PATH: &str = "state/monitors.json";
const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotDoc {
    version: u32,
    monitors: Vec<Monitor>,
}

#[derive(Debug)]
pub struct SnapshotStore {
    path: PathBuf,
    /// Held across snapshot, temp write and rename; saves never interleave.
    write_lock: Mutex<()>,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persisted monitors; a missing file means none.
    pub async fn load(&self) -> Result<Vec<Monitor>> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(s) => s,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let doc: SnapshotDoc = serde_json::from_str(&content)?;
        tracing::info!(
            target: "store",
            path = %self.path.display(),
            monitors = doc.monitors.len(),
            "monitors restored"
        );
        Ok(doc.monitors)
    }

    /// Write the whole registry via a temp file + rename. The registry is
    /// read only once the previous save has finished, so the newest state
    /// always lands last.
    pub async fn save(&self, registry: &MonitorRegistry) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let doc = SnapshotDoc {
            version: FORMAT_VERSION,
            monitors: registry.snapshot(),
        };
        let bytes = serde_json::to_vec_pretty(&doc)?;

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, bytes).await?;
        fs::rename(&tmp, &self.path).await?;
        tracing::debug!(target: "store", path = %self.path.display(), monitors = doc.monitors.len(), "monitors saved");
        Ok(())
    }
}
