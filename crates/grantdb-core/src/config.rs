//! Layered settings and path helpers.
//!
//! Uses Figment to merge built-in defaults, `grantdb.toml`,
//! `grantdb.<env>.toml` and `GRANTDB_*` env vars (`__` separates nested
//! keys, e.g. `GRANTDB_QUEUE__CAPACITY=4`). Provides helpers to expand `~`
//! and `${VAR}` and to resolve relative paths against a known base directory.
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    pub staging_dir: String,
    pub index_dir: String,
    pub store_dir: String,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            staging_dir: "./data/staging".to_string(),
            index_dir: "./data/index".to_string(),
            store_dir: "./data/store".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    pub capacity: usize,
    /// Worker count; falls back to `capacity` when unset.
    pub workers: Option<usize>,
    pub task_timeout_secs: u64,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self { capacity: 10, workers: None, task_timeout_secs: 100 }
    }
}

impl QueueSettings {
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or(self.capacity)
    }

    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub timeout_secs: u64,
    pub link_table: String,
    pub raw_table: String,
    pub patent_table: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 5,
            link_table: "links".to_string(),
            raw_table: "raw_records".to_string(),
            patent_table: "patents".to_string(),
        }
    }
}

impl StorageSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadSettings {
    pub connect_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 30,
            user_agent: concat!("grantdb/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub default_limit: usize,
    pub max_limit: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self { default_limit: 20, max_limit: 100 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractSettings {
    pub max_depth: usize,
}

impl Default for ExtractSettings {
    fn default() -> Self {
        Self { max_depth: 10 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub paths: PathSettings,
    pub queue: QueueSettings,
    pub storage: StorageSettings,
    pub download: DownloadSettings,
    pub search: SearchSettings,
    pub extract: ExtractSettings,
}

impl Settings {
    /// Load from the working directory and environment.
    pub fn load() -> Result<Self, ConfigError> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        let figment = Self::figment()
            .merge(Toml::file("grantdb.toml"))
            .merge(Toml::file(format!("grantdb.{env_name}.toml")))
            .merge(Env::prefixed("GRANTDB_").split("__"));
        Self::from_figment(&figment)
    }

    /// Defaults only; callers layer their own providers on top.
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Settings::default()))
    }

    pub fn from_figment(figment: &Figment) -> Result<Self, ConfigError> {
        let settings: Settings = figment.extract().map_err(Box::new)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("queue.capacity", self.queue.capacity as u64),
            ("queue.workers", self.queue.worker_count() as u64),
            ("queue.task_timeout_secs", self.queue.task_timeout_secs),
            ("storage.timeout_secs", self.storage.timeout_secs),
            ("search.default_limit", self.search.default_limit as u64),
            ("search.max_limit", self.search.max_limit as u64),
        ];
        if let Some((key, _)) = positive.iter().find(|(_, v)| *v == 0) {
            return Err(ConfigError::Invalid(format!("'{key}' must be greater than zero")));
        }
        if self.search.default_limit > self.search.max_limit {
            return Err(ConfigError::Invalid(format!(
                "'search.default_limit' ({}) exceeds 'search.max_limit' ({})",
                self.search.default_limit, self.search.max_limit
            )));
        }
        Ok(())
    }

    pub fn staging_dir(&self) -> PathBuf {
        expand_path(&self.paths.staging_dir)
    }

    pub fn index_dir(&self) -> PathBuf {
        expand_path(&self.paths.index_dir)
    }

    pub fn store_dir(&self) -> PathBuf {
        expand_path(&self.paths.store_dir)
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() {
        p
    } else {
        base.join(p)
    }
}
