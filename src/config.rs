// src/config.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::monitor::{MonitorKind, DEFAULT_SEEN_CAPACITY};

pub const ENV_CONFIG_PATH: &str = "WATCHTOWER_CONFIG_PATH";
const ENV_CYCLE_INTERVAL: &str = "WATCHTOWER_CYCLE_INTERVAL_SECS";
const ENV_MAX_CONCURRENCY: &str = "WATCHTOWER_MAX_CONCURRENCY";
const ENV_STATE_PATH: &str = "WATCHTOWER_STATE_PATH";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchtowerConfig {
    pub cycle_interval_secs: u64,
    pub max_concurrency: usize,
    pub dedup_capacity: usize,
    pub alert_log_capacity: usize,
    pub state_path: PathBuf,
    pub weights_path: PathBuf,
    pub provider: ProviderConfig,
}

impl Default for WatchtowerConfig {
    fn default() -> Self {
        Self {
            cycle_interval_secs: 60,
            max_concurrency: crate::scheduler::DEFAULT_MAX_CONCURRENCY,
            dedup_capacity: DEFAULT_SEEN_CAPACITY,
            alert_log_capacity: crate::history::DEFAULT_ALERT_LOG_CAPACITY,
            state_path: PathBuf::from(crate::store::DEFAULT_STATE_PATH),
            weights_path: PathBuf::from(crate::rank::weights::DEFAULT_WEIGHTS_PATH),
            provider: ProviderConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub timeout_secs: u64,
    /// Feed URL per monitor kind; kinds without one yield no findings.
    pub feeds: HashMap<MonitorKind, String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            feeds: HashMap::new(),
        }
    }
}

impl WatchtowerConfig {
    pub fn cycle_interval(&self) -> Duration {
        Duration::from_secs(self.cycle_interval_secs)
    }

    fn clamp(mut self) -> Self {
        self.cycle_interval_secs = self.cycle_interval_secs.max(1);
        self.max_concurrency = self.max_concurrency.max(1);
        self.dedup_capacity = self.dedup_capacity.max(1);
        self.alert_log_capacity = self.alert_log_capacity.max(1);
        self.provider.timeout_secs = self.provider.timeout_secs.max(1);
        self
    }

    fn apply_env(mut self) -> Self {
        if let Some(v) = env_parse::<u64>(ENV_CYCLE_INTERVAL) {
            self.cycle_interval_secs = v;
        }
        if let Some(v) = env_parse::<usize>(ENV_MAX_CONCURRENCY) {
            self.max_concurrency = v;
        }
        if let Ok(p) = std::env::var(ENV_STATE_PATH) {
            if !p.trim().is_empty() {
                self.state_path = PathBuf::from(p.trim());
            }
        }
        self
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparsable env override");
            None
        }
    }
}

/// Load config from an explicit path. TOML or JSON by extension.
pub fn load_config_from(path: &Path) -> Result<WatchtowerConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let cfg = parse_config(&content, ext.as_str())
        .with_context(|| format!("parsing config {}", path.display()))?;
    Ok(cfg.apply_env().clamp())
}

/// Load config using env var + fallbacks:
/// 1) $WATCHTOWER_CONFIG_PATH
/// 2) config/watchtower.toml
/// 3) config/watchtower.json
/// 4) defaults
///
/// Env overrides apply on top of whichever source won.
pub fn load_config_default() -> Result<WatchtowerConfig> {
    if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_config_from(&pb);
        }
        return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
    }
    for candidate in ["config/watchtower.toml", "config/watchtower.json"] {
        let pb = PathBuf::from(candidate);
        if pb.exists() {
            return load_config_from(&pb);
        }
    }
    Ok(WatchtowerConfig::default().apply_env().clamp())
}

fn parse_config(s: &str, hint_ext: &str) -> Result<WatchtowerConfig> {
    match hint_ext {
        "toml" => Ok(toml::from_str(s)?),
        "json" => Ok(serde_json::from_str(s)?),
        _ => serde_json::from_str(s)
            .map_err(anyhow::Error::from)
            .or_else(|_| toml::from_str(s).map_err(anyhow::Error::from))
            .map_err(|_| anyhow!("unsupported config format")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn clear_env() {
        for k in [ENV_CONFIG_PATH, ENV_CYCLE_INTERVAL, ENV_MAX_CONCURRENCY, ENV_STATE_PATH] {
            env::remove_var(k);
        }
    }

    #[test]
    fn toml_with_feeds_and_partial_fields() {
        let cfg = parse_config(
            r#"
cycle_interval_secs = 300
dedup_capacity = 0

[provider]
timeout_secs = 5

[provider.feeds]
job_postings = "http://feeds.local/jobs"
industry_news = "http://feeds.local/news"
"#,
            "toml",
        )
        .unwrap()
        .clamp();
        assert_eq!(cfg.cycle_interval_secs, 300);
        assert_eq!(cfg.max_concurrency, 4);
        assert_eq!(cfg.dedup_capacity, 1);
        assert_eq!(cfg.provider.timeout_secs, 5);
        assert_eq!(
            cfg.provider.feeds.get(&MonitorKind::JobPostings).map(String::as_str),
            Some("http://feeds.local/jobs")
        );
        assert!(!cfg.provider.feeds.contains_key(&MonitorKind::ResearchPublications));
    }

    #[test]
    fn json_without_hint_is_accepted() {
        let cfg = parse_config(r#"{"max_concurrency": 8}"#, "").unwrap();
        assert_eq!(cfg.max_concurrency, 8);
        assert_eq!(cfg.state_path, PathBuf::from("state/monitors.json"));
    }

    #[serial_test::serial]
    #[test]
    fn default_uses_env_then_fallbacks() {
        let old = env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        env::set_current_dir(tmp.path()).unwrap();
        clear_env();

        // No files in the temp CWD → defaults.
        assert_eq!(load_config_default().unwrap(), WatchtowerConfig::default());

        // config/watchtower.json is picked up.
        fs::create_dir_all(tmp.path().join("config")).unwrap();
        fs::write(
            tmp.path().join("config/watchtower.json"),
            r#"{"cycle_interval_secs": 120}"#,
        )
        .unwrap();
        assert_eq!(load_config_default().unwrap().cycle_interval_secs, 120);

        // Explicit path wins, env overrides win over the file.
        let explicit = tmp.path().join("custom.toml");
        fs::write(&explicit, "cycle_interval_secs = 30\nmax_concurrency = 2\n").unwrap();
        env::set_var(ENV_CONFIG_PATH, explicit.display().to_string());
        env::set_var(ENV_MAX_CONCURRENCY, "6");
        env::set_var(ENV_STATE_PATH, "/var/lib/watchtower/m.json");
        let cfg = load_config_default().unwrap();
        assert_eq!(cfg.cycle_interval_secs, 30);
        assert_eq!(cfg.max_concurrency, 6);
        assert_eq!(cfg.state_path, PathBuf::from("/var/lib/watchtower/m.json"));

        // Dangling explicit path is an error.
        env::set_var(ENV_CONFIG_PATH, tmp.path().join("missing.toml").display().to_string());
        assert!(load_config_default().is_err());

        clear_env();
        env::set_current_dir(&old).unwrap();
    }
}
