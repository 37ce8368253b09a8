//! Persistent connector configuration model and file-backed manager.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

const CONFIG_FILE: &str = "config.json";
const ATTRIBUTE_CACHE_FILE: &str = "repositoryConfigurations";

/// Default cap on the number of tickets fetched by a single query.
pub const DEFAULT_MAX_HITS: u32 = 5000;

fn default_max_hits() -> u32 {
    DEFAULT_MAX_HITS
}

fn default_rich_editor() -> bool {
    true
}

fn default_log_filter() -> String {
    "info".to_string()
}

/// Connector settings persisted as JSON.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct ConnectorConfig {
    pub attribute_cache_file: Option<PathBuf>,
    #[serde(default = "default_max_hits")]
    pub max_hits: u32,
    #[serde(default = "default_rich_editor")]
    pub rich_editor: bool,
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            attribute_cache_file: None,
            max_hits: default_max_hits(),
            rich_editor: default_rich_editor(),
            log_filter: default_log_filter(),
        }
    }
}

/// Loads and saves [`ConnectorConfig`] under the platform config directory.
pub struct ConfigManager {
    path: PathBuf,
}

impl ConfigManager {
    /// Creates a manager bound to the platform-specific config path, or to
    /// the working directory when the platform reports none.
    pub fn new() -> Self {
        Self {
            path: config_dir().join(CONFIG_FILE),
        }
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Loads config from disk, falling back to defaults on read/parse errors.
    pub fn load(&self) -> ConnectorConfig {
        if self.path.exists() {
            let content = fs::read_to_string(&self.path).unwrap_or_default();
            serde_json::from_str(&content).unwrap_or_else(|err| {
                log::warn!("Ignoring unreadable config {}: {err}", self.path.display());
                ConnectorConfig::default()
            })
        } else {
            ConnectorConfig::default()
        }
    }

    /// Persists config to disk, creating parent directories when needed.
    pub fn save(&self, config: &ConnectorConfig) -> Result<(), std::io::Error> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(config)?;
        fs::write(&self.path, content)?;
        Ok(())
    }

    /// Cache file location: the configured one, else next to the config file.
    pub fn attribute_cache_file(&self, config: &ConnectorConfig) -> PathBuf {
        config.attribute_cache_file.clone().unwrap_or_else(|| {
            self.path
                .parent()
                .map(|dir| dir.join(ATTRIBUTE_CACHE_FILE))
                .unwrap_or_else(|| PathBuf::from(ATTRIBUTE_CACHE_FILE))
        })
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

fn config_dir() -> PathBuf {
    match directories::ProjectDirs::from("org", "jira", "jira-connector") {
        Some(dirs) => dirs.config_dir().to_path_buf(),
        None => PathBuf::from("."),
    }
}
