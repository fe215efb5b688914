//! Configuration for the Rapport trust layer.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Full configuration, loadable from TOML.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RapportConfig {
    /// Graph cache settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Offline publish retry settings.
    #[serde(default)]
    pub sync: SyncConfig,

    /// Passphrase key-derivation cost parameters.
    #[serde(default)]
    pub kdf: KdfConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Age after which a cached entry is refreshed in the background.
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,
    /// Number of identifiers refreshed concurrently by batch refreshes.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Delay between background retries of dirty fields.
    #[serde(default = "default_retry_interval_secs")]
    pub retry_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KdfConfig {
    /// Argon2id memory cost in KiB.
    #[serde(default = "default_memory_kib")]
    pub memory_kib: u32,
    /// Argon2id iteration count.
    #[serde(default = "default_iterations")]
    pub iterations: u32,
    /// Argon2id lanes.
    #[serde(default = "default_parallelism")]
    pub parallelism: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (text, json).
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_stale_after_secs() -> u64 {
    3600
}
fn default_batch_size() -> usize {
    3
}
fn default_retry_interval_secs() -> u64 {
    30
}
fn default_memory_kib() -> u32 {
    19 * 1024
}
fn default_iterations() -> u32 {
    2
}
fn default_parallelism() -> u32 {
    1
}
fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "text".into()
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            stale_after_secs: default_stale_after_secs(),
            batch_size: default_batch_size(),
        }
    }
}

impl CacheConfig {
    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            retry_interval_secs: default_retry_interval_secs(),
        }
    }
}

impl SyncConfig {
    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_secs)
    }
}

impl Default for KdfConfig {
    fn default() -> Self {
        Self {
            memory_kib: default_memory_kib(),
            iterations: default_iterations(),
            parallelism: default_parallelism(),
        }
    }
}

impl KdfConfig {
    /// Cheap parameters for tests. Never use for real key material.
    pub fn insecure_fast() -> Self {
        Self {
            memory_kib: 64,
            iterations: 1,
            parallelism: 1,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl RapportConfig {
    /// Load config from a TOML file, falling back to defaults for missing fields.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            let config: RapportConfig = toml::from_str(&contents)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save the current config to a TOML file.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        Ok(())
    }
}
