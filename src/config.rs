use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::FilterError;
use crate::link::{DEFAULT_EXPLORE_PATH, DEFAULT_LINK_PARAM, LinkEncoder};

const CONFIG_FILE: &str = "filtersync.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub dir: Option<PathBuf>,
    pub level: String,
    pub retention: usize,
    pub dev6: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self { dir: None, level: "info".into(), retention: 7, dev6: false }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub debounce_ms: u64,
    pub explore_base_path: String,
    pub link_param: String,
    pub track_total_hits: bool,
    pub log: LogSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 300,
            explore_base_path: DEFAULT_EXPLORE_PATH.into(),
            link_param: DEFAULT_LINK_PARAM.into(),
            track_total_hits: true,
            log: LogSettings::default(),
        }
    }
}

impl EngineConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn link_encoder(&self) -> LinkEncoder {
        LinkEncoder::new(self.explore_base_path.clone(), self.link_param.clone())
    }

    pub fn from_toml(s: &str) -> Result<Self, FilterError> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, FilterError> {
        let s = std::fs::read_to_string(path)?;
        Self::from_toml(&s)
    }

    fn apply_env(&mut self) {
        if let Some(ms) = std::env::var("FILTERSYNC_DEBOUNCE_MS").ok().and_then(|s| s.parse().ok()) {
            self.debounce_ms = ms;
        }
        if let Ok(p) = std::env::var("FILTERSYNC_EXPLORE_PATH") {
            self.explore_base_path = p;
        }
    }
}

/// Candidate config files, most specific first.
pub fn config_paths(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(p) = cli_path {
        paths.push(p.to_path_buf());
    }
    if let Ok(p) = std::env::var("FILTERSYNC_CONFIG") {
        paths.push(PathBuf::from(p));
    }
    if let Some(dir) = dirs_next::config_dir() {
        paths.push(dir.join(CONFIG_FILE));
    }
    if let Ok(cur) = std::env::current_dir() {
        paths.push(cur.join(CONFIG_FILE));
    }
    paths
}

/// Resolve configuration: first existing file wins, then env overrides.
///
/// # Errors
/// Returns an error if the chosen file exists but cannot be read or parsed.
pub fn load_config(cli_path: Option<&Path>) -> Result<EngineConfig, FilterError> {
    let mut cfg = match config_paths(cli_path).into_iter().find(|p| p.exists()) {
        Some(p) => {
            log::info!("loading config from {}", p.display());
            EngineConfig::from_file(&p)?
        }
        None => EngineConfig::default(),
    };
    cfg.apply_env();
    Ok(cfg)
}
