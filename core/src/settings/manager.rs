use crate::policy::SensitivityLevel;
use crate::settings::namespace::{KeyValueStore, SettingsError};
use crate::settings::Settings;
use crate::telemetry::LogManager;
use tokio::sync::watch;

/// Namespace key the settings are cached under.
pub const SETTINGS_KEY: &str = "fireGuardSettings";

/// Single owner of the session settings. Every mutation is persisted and
/// broadcast to subscribers such as the detection loop.
pub struct SettingsManager<K> {
    store: K,
    current: watch::Sender<Settings>,
    logger: LogManager,
}

impl<K: KeyValueStore> SettingsManager<K> {
    /// Loads cached settings. Missing, unreadable or malformed entries fall
    /// back to defaults instead of failing session start.
    pub fn load(store: K) -> Self {
        let logger = LogManager::new("settings");
        let settings = match store.get(SETTINGS_KEY) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|err| {
                logger.warn(&format!("ignoring malformed cached settings: {}", err));
                Settings::default()
            }),
            Ok(None) => Settings::default(),
            Err(err) => {
                logger.warn(&format!("reading cached settings failed: {}", err));
                Settings::default()
            }
        };
        let (current, _) = watch::channel(settings);
        Self {
            store,
            current,
            logger,
        }
    }

    pub fn current(&self) -> Settings {
        *self.current.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Settings> {
        self.current.subscribe()
    }

    pub fn toggle_ai(&self) -> Settings {
        self.update(|settings| settings.ai_active = !settings.ai_active)
    }

    pub fn set_sensitivity(&self, level: SensitivityLevel) -> Settings {
        self.update(|settings| settings.sensitivity = level)
    }

    pub fn toggle_notifications(&self) -> Settings {
        self.update(|settings| settings.notifications_enabled = !settings.notifications_enabled)
    }

    pub fn toggle_location(&self) -> Settings {
        self.update(|settings| settings.location_enabled = !settings.location_enabled)
    }

    /// Records a location state decided outside the user toggle, such as a
    /// denied permission. Nothing is written when the value is unchanged.
    pub fn set_location_enabled(&self, enabled: bool) -> Settings {
        if self.current().location_enabled == enabled {
            return self.current();
        }
        self.update(|settings| settings.location_enabled = enabled)
    }

    fn update(&self, mutate: impl FnOnce(&mut Settings)) -> Settings {
        self.current.send_modify(mutate);
        let settings = self.current();
        if let Err(err) = self.save(&settings) {
            self.logger.warn(&format!("persisting settings failed: {}", err));
        }
        settings
    }

    fn save(&self, settings: &Settings) -> Result<(), SettingsError> {
        let raw = serde_json::to_string(settings)?;
        self.store.set(SETTINGS_KEY, &raw)
    }
}
