//! Process-wide user settings with an explicit load-at-start, save-on-mutation
//! lifecycle.

pub mod manager;
pub mod namespace;

pub use manager::{SettingsManager, SETTINGS_KEY};
pub use namespace::{FileNamespace, KeyValueStore, MemoryNamespace, SettingsError};

use crate::policy::SensitivityLevel;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub ai_active: bool,
    pub sensitivity: SensitivityLevel,
    pub notifications_enabled: bool,
    pub location_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ai_active: true,
            sensitivity: SensitivityLevel::Medium,
            notifications_enabled: true,
            location_enabled: true,
        }
    }
}
