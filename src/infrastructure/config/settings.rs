use super::app_config::{AppConfig, NoticeConfig, StorageConfig, SweepConfig, WriteConfig};
use serde::{Deserialize, Serialize};

/// User settings stored in settings.yaml in user config directory.
/// All fields are optional - missing sections keep the embedded defaults.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct UserSettings {
    pub storage: Option<StorageConfig>,
    pub notices: Option<NoticeConfig>,
    pub writes: Option<WriteConfig>,
    pub sweep: Option<SweepConfig>,
}

impl UserSettings {
    /// Overlay these settings on top of `config`.
    pub fn apply(self, mut config: AppConfig) -> AppConfig {
        if let Some(storage) = self.storage {
            config.storage = storage;
        }
        if let Some(notices) = self.notices {
            config.notices = notices;
        }
        if let Some(writes) = self.writes {
            config.writes = writes;
        }
        if let Some(sweep) = self.sweep {
            config.sweep = sweep;
        }
        config
    }
}
