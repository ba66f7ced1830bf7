mod app_config;
pub mod loader;
pub mod paths;
mod settings;

pub use app_config::*;
pub use settings::UserSettings;

/// Load the application configuration (called once at startup).
pub fn load() -> AppConfig {
    let config = loader::load_app_config();
    tracing::info!("Configuration loaded (storage={:?})", config.storage.storage_type);
    config
}
