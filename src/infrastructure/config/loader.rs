use include_dir::{include_dir, Dir};
use serde::de::DeserializeOwned;
use std::path::Path;

use super::app_config::AppConfig;
use super::paths::settings_path;
use super::settings::UserSettings;

// Embed the entire configs directory at compile time
static CONFIGS_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/resources/configs");

/// Load a YAML configuration file from disk
pub fn load_yaml<T: DeserializeOwned>(path: impl AsRef<Path>) -> anyhow::Result<T> {
    let content = std::fs::read_to_string(path)?;
    let config: T = serde_yaml::from_str(&content)?;
    Ok(config)
}

/// Parse YAML from string
pub fn parse_yaml<T: DeserializeOwned>(content: &str) -> anyhow::Result<T> {
    let config: T = serde_yaml::from_str(content)?;
    Ok(config)
}

/// Load embedded configuration by name from the configs directory
/// Files are embedded at compile time using include_dir
pub fn load_embedded_config<T: DeserializeOwned + Default>(name: &str) -> T {
    let file_name = format!("{}.yaml", name);

    let Some(file) = CONFIGS_DIR.get_file(&file_name) else {
        tracing::warn!("Embedded config {} not found, using defaults", name);
        return T::default();
    };
    let Some(content) = file.contents_utf8() else {
        tracing::error!("Embedded config {} is not valid UTF-8", name);
        return T::default();
    };

    match parse_yaml::<T>(content) {
        Ok(config) => {
            tracing::debug!("Loaded embedded config: {}", name);
            config
        }
        Err(e) => {
            tracing::error!("Failed to parse embedded config {}: {}", name, e);
            T::default()
        }
    }
}

/// Load user settings from `path`.
/// Returns default settings if file doesn't exist or is invalid
pub fn load_user_settings(path: &Path) -> UserSettings {
    if path.exists() {
        match load_yaml::<UserSettings>(path) {
            Ok(settings) => {
                tracing::info!("Loaded user settings from {:?}", path);
                return settings;
            }
            Err(e) => {
                tracing::warn!("Failed to parse {:?}: {}, using defaults", path, e);
            }
        }
    } else {
        tracing::debug!("No settings file at {:?}, using defaults", path);
    }

    UserSettings::default()
}

/// Embedded defaults overlaid with the user's settings.yaml.
pub fn load_app_config() -> AppConfig {
    let defaults: AppConfig = load_embedded_config("app");
    load_user_settings(&settings_path()).apply(defaults)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::config::StorageType;

    #[test]
    fn test_embedded_app_config() {
        let config: AppConfig = load_embedded_config("app");
        assert_eq!(config.storage.storage_type, StorageType::Sqlite);
        assert_eq!(config.writes.max_attempts, 3);
        assert_eq!(config.notices.clear_after(), std::time::Duration::from_secs(5));
    }

    #[test]
    fn test_user_settings_override_storage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.yaml");
        std::fs::write(
            &path,
            "storage:\n  type: mongodb\n  mongodb:\n    uri: mongodb://db:27017\n    database: league\n",
        )
        .unwrap();

        let config = load_user_settings(&path).apply(AppConfig::default());
        assert_eq!(config.storage.storage_type, StorageType::Mongodb);
        assert_eq!(config.storage.mongodb.database, "league");
        assert_eq!(config.writes.max_attempts, 3);
    }

    #[test]
    fn test_invalid_user_settings_fall_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.yaml");
        std::fs::write(&path, "storage: [not, a, map]").unwrap();

        let settings = load_user_settings(&path);
        assert!(settings.storage.is_none());
        assert!(load_user_settings(&dir.path().join("missing.yaml")).storage.is_none());
    }
}
