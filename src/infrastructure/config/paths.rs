use std::path::PathBuf;

const APP_DIR: &str = "scoreworld";

/// Overrides the platform directory, e.g. for a daemon running as a service user.
pub const CONFIG_DIR_ENV: &str = "SCOREWORLD_CONFIG_DIR";

/// Directory holding settings, the SQLite file and logs.
pub fn config_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV).filter(|d| !d.is_empty()) {
        return PathBuf::from(dir);
    }

    #[cfg(target_os = "macos")]
    let base = dirs::home_dir().map(|home| home.join("Library/Application Support"));
    #[cfg(not(target_os = "macos"))]
    let base = dirs::config_dir();

    base.unwrap_or_else(|| PathBuf::from(".")).join(APP_DIR)
}

pub fn default_sqlite_path() -> PathBuf {
    config_dir().join("scoreworld.db")
}

pub fn log_dir() -> PathBuf {
    config_dir().join("logs")
}

pub fn settings_path() -> PathBuf {
    config_dir().join("settings.yaml")
}
