use super::paths;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_NOTICE_CLEAR_AFTER: Duration = Duration::from_secs(5);
const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub notices: NoticeConfig,
    pub writes: WriteConfig,
    pub sweep: SweepConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Storage backend: "sqlite" (default) or "mongodb"
    #[serde(rename = "type")]
    pub storage_type: StorageType,
    pub sqlite: SqliteConfig,
    pub mongodb: MongoDbConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    #[default]
    Sqlite,
    Mongodb,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SqliteConfig {
    /// Leave empty to use platform default path
    pub path: String,
}

impl SqliteConfig {
    pub fn effective_path(&self) -> PathBuf {
        if self.path.is_empty() {
            paths::default_sqlite_path()
        } else {
            PathBuf::from(&self.path)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MongoDbConfig {
    pub uri: String,
    pub database: String,
}

impl Default for MongoDbConfig {
    fn default() -> Self {
        Self {
            uri: "mongodb://localhost:27017".to_string(),
            database: "scoreworld".to_string(),
        }
    }
}

/// Transient user-facing notices
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NoticeConfig {
    /// How long a notice stays visible, e.g. "5s"
    pub clear_after: String,
}

impl Default for NoticeConfig {
    fn default() -> Self {
        Self {
            clear_after: "5s".to_string(),
        }
    }
}

impl NoticeConfig {
    pub fn clear_after(&self) -> Duration {
        parse_duration_or("notices.clearAfter", &self.clear_after, DEFAULT_NOTICE_CLEAR_AFTER)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WriteConfig {
    /// Attempts per world mutation before a stale write is reported
    pub max_attempts: u32,
}

impl Default for WriteConfig {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Period of the bank expiry sweep, e.g. "60s"
    pub interval: String,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval: "60s".to_string(),
        }
    }
}

impl SweepConfig {
    pub fn interval(&self) -> Duration {
        parse_duration_or("sweep.interval", &self.interval, DEFAULT_SWEEP_INTERVAL)
    }
}

fn parse_duration_or(key: &str, value: &str, fallback: Duration) -> Duration {
    match humantime::parse_duration(value.trim()) {
        Ok(duration) if !duration.is_zero() => duration,
        Ok(_) => {
            tracing::warn!("{} must be positive, using {:?}", key, fallback);
            fallback
        }
        Err(e) => {
            tracing::warn!("Invalid {} {:?}: {}, using {:?}", key, value, e, fallback);
            fallback
        }
    }
}
