use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::persistence::{load_value, store_value, KeyValueStorage, SETTINGS_KEY};

pub const DEFAULT_SLEEP_TIME: &str = "23:00";
pub const DEFAULT_REMINDER_INTERVAL_MINUTES: u32 = 30;

/// User preferences. Unknown or missing persisted fields fall back to the defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Local wall-clock bedtime, `HH:MM`.
    pub sleep_time: String,
    #[serde(alias = "reminderInterval")]
    pub reminder_interval_minutes: u32,
    #[serde(alias = "notifications")]
    pub notifications_enabled: bool,
    pub dark_mode: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sleep_time: DEFAULT_SLEEP_TIME.into(),
            reminder_interval_minutes: DEFAULT_REMINDER_INTERVAL_MINUTES,
            notifications_enabled: true,
            dark_mode: false,
        }
    }
}

/// Partial update of [Settings]. Fields left as `None` keep their previous value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sleep_time: Option<String>,
    #[serde(
        default,
        alias = "reminderInterval",
        skip_serializing_if = "Option::is_none"
    )]
    pub reminder_interval_minutes: Option<u32>,
    #[serde(default, alias = "notifications", skip_serializing_if = "Option::is_none")]
    pub notifications_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dark_mode: Option<bool>,
}

impl Settings {
    pub fn apply(&mut self, patch: SettingsPatch) {
        let SettingsPatch {
            sleep_time,
            reminder_interval_minutes,
            notifications_enabled,
            dark_mode,
        } = patch;
        if let Some(v) = sleep_time {
            self.sleep_time = v;
        }
        match reminder_interval_minutes {
            Some(0) => warn!("Ignoring a reminder interval of 0 minutes"),
            Some(v) => self.reminder_interval_minutes = v,
            None => {}
        }
        if let Some(v) = notifications_enabled {
            self.notifications_enabled = v;
        }
        if let Some(v) = dark_mode {
            self.dark_mode = v;
        }
    }

    /// Parsed bedtime. An unparsable value falls back to the default bedtime.
    pub fn sleep_time(&self) -> NaiveTime {
        parse_sleep_time(&self.sleep_time).unwrap_or_else(|| {
            warn!(
                "Sleep time {:?} is not HH:MM, using {DEFAULT_SLEEP_TIME}",
                self.sleep_time
            );
            default_sleep_time()
        })
    }
}

pub fn parse_sleep_time(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").ok()
}

fn default_sleep_time() -> NaiveTime {
    NaiveTime::from_hms_opt(23, 0, 0).unwrap_or(NaiveTime::MIN)
}

/// Holds the single settings record. Every update is written back whole, last writer wins.
pub struct SettingsStore<S> {
    storage: S,
    current: Settings,
}

impl<S: KeyValueStorage> SettingsStore<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            current: Settings::default(),
        }
    }

    pub async fn load(&mut self) {
        self.current = match load_value::<Settings>(&self.storage, SETTINGS_KEY).await {
            Ok(Some(mut settings)) => {
                if settings.reminder_interval_minutes == 0 {
                    warn!("Stored reminder interval is 0, using the default");
                    settings.reminder_interval_minutes = DEFAULT_REMINDER_INTERVAL_MINUTES;
                }
                settings
            }
            Ok(None) => {
                info!("No settings found, using defaults");
                Settings::default()
            }
            Err(e) => {
                error!("Failed to load settings, using defaults: {e:?}");
                Settings::default()
            }
        };
    }

    pub fn get(&self) -> &Settings {
        &self.current
    }

    /// Shallow-merges `patch` into the current settings and persists the result.
    pub async fn set(&mut self, patch: SettingsPatch) -> &Settings {
        self.current.apply(patch);
        info!("Settings updated to {:?}", self.current);
        self.persist().await;
        &self.current
    }

    pub async fn reset(&mut self) -> &Settings {
        self.current = Settings::default();
        self.persist().await;
        &self.current
    }

    pub async fn persist(&self) {
        if let Err(e) = store_value(&self.storage, SETTINGS_KEY, &self.current).await {
            error!("Failed to save settings, keeping them in memory: {e:?}");
        }
    }
}
