//! TOML-based configuration.
//!
//! Stores:
//! - Optimizer granularity and fixed-event handling
//! - Calendar id and API endpoint
//! - The timezone that defines a "day"
//!
//! Configuration is stored at `~/.config/flexcal/config.toml`.

use std::path::{Path, PathBuf};

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::data_dir;
use crate::error::ConfigError;

const MINUTES_PER_DAY: u32 = 24 * 60;

/// Day optimizer settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Slot granularity in minutes. Must divide a 24-hour day.
    #[serde(default = "default_slot_minutes")]
    pub slot_minutes: u32,
    /// Keep fixed events where they are and avoid overlapping them.
    #[serde(default = "default_true")]
    pub respect_fixed_events: bool,
}

/// External calendar settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarConfig {
    #[serde(default = "default_calendar_id")]
    pub calendar_id: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/flexcal/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub optimizer: OptimizerConfig,
    #[serde(default)]
    pub calendar: CalendarConfig,
    /// IANA timezone name; UTC when unset.
    #[serde(default)]
    pub timezone: Option<String>,
}

fn default_slot_minutes() -> u32 {
    15
}
fn default_true() -> bool {
    true
}
fn default_calendar_id() -> String {
    "primary".into()
}
fn default_api_base() -> String {
    "https://www.googleapis.com/calendar/v3".into()
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            slot_minutes: default_slot_minutes(),
            respect_fixed_events: true,
        }
    }
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            calendar_id: default_calendar_id(),
            api_base: default_api_base(),
        }
    }
}

impl OptimizerConfig {
    /// Reject granularities that do not tile a day.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let g = self.slot_minutes;
        if g == 0 || g > MINUTES_PER_DAY || MINUTES_PER_DAY % g != 0 {
            return Err(ConfigError::InvalidValue {
                key: "optimizer.slot_minutes".into(),
                message: format!("{g} does not divide {MINUTES_PER_DAY}"),
            });
        }
        Ok(())
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        if key.is_empty() {
            return Err(unknown());
        }

        let mut parts = key.split('.').peekable();
        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => serde_json::Value::Number(
                        value
                            .parse::<u64>()
                            .map_err(|e| invalid(e.to_string()))?
                            .into(),
                    ),
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        return Err(invalid("cannot replace a whole section".into()));
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    fn path() -> Result<PathBuf, ConfigError> {
        let dir = data_dir().map_err(|e| ConfigError::LoadFailed {
            path: PathBuf::from("~/.config/flexcal"),
            message: e.to_string(),
        })?;
        Ok(dir.join("config.toml"))
    }

    /// Load from the data directory, writing the defaults on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            let cfg = Self::default();
            cfg.save_to(&path)?;
            info!(path = %path.display(), "wrote default configuration");
            Ok(cfg)
        }
    }

    /// Load and validate the file at `path`.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let cfg: Config =
            toml::from_str(&content).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        cfg.validate()?;
        debug!(path = %path.display(), "configuration loaded");
        Ok(cfg)
    }

    /// Persist to the data directory.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(Self::path()?)
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by dot-separated key. Does not save.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed,
    /// or the resulting configuration is invalid. On error `self` is unchanged.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json =
            serde_json::to_value(&*self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config =
            serde_json::from_value(json).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.optimizer.validate()?;
        self.tz()?;
        Ok(())
    }

    /// Timezone in which days are evaluated.
    pub fn tz(&self) -> Result<Tz, ConfigError> {
        match self.timezone.as_deref() {
            None => Ok(Tz::UTC),
            Some(name) => name.parse::<Tz>().map_err(|e| ConfigError::InvalidValue {
                key: "timezone".into(),
                message: e.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let cfg = Config::default();
        assert_eq!(cfg.optimizer.slot_minutes, 15);
        assert!(cfg.optimizer.respect_fixed_events);
        assert_eq!(cfg.calendar.calendar_id, "primary");
        assert_eq!(cfg.tz().unwrap(), Tz::UTC);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let cfg: Config = toml::from_str("[optimizer]\nslot_minutes = 30\n").unwrap();
        assert_eq!(cfg.optimizer.slot_minutes, 30);
        assert!(cfg.optimizer.respect_fixed_events);
        assert_eq!(cfg.calendar, CalendarConfig::default());
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("optimizer.slot_minutes").as_deref(), Some("15"));
        assert_eq!(cfg.get("calendar.calendar_id").as_deref(), Some("primary"));
        assert!(cfg.get("optimizer.missing").is_none());
        assert!(cfg.get("timezone").is_none());
    }

    #[test]
    fn set_updates_nested_values() {
        let mut cfg = Config::default();
        cfg.set("optimizer.slot_minutes", "30").unwrap();
        cfg.set("optimizer.respect_fixed_events", "false").unwrap();
        cfg.set("timezone", "Europe/London").unwrap();
        assert_eq!(cfg.optimizer.slot_minutes, 30);
        assert!(!cfg.optimizer.respect_fixed_events);
        assert_eq!(cfg.tz().unwrap(), chrono_tz::Europe::London);
    }

    #[test]
    fn set_rejects_unknown_key() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.set("optimizer.nonexistent", "1"),
            Err(ConfigError::UnknownKey(_))
        ));
    }

    #[test]
    fn set_rejects_bad_values_and_keeps_state() {
        let mut cfg = Config::default();
        assert!(cfg.set("optimizer.respect_fixed_events", "maybe").is_err());
        assert!(cfg.set("optimizer.slot_minutes", "7").is_err());
        assert!(cfg.set("timezone", "Mars/Olympus").is_err());
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn granularity_must_tile_the_day() {
        for g in [1, 5, 15, 30, 60, 1440] {
            let cfg = OptimizerConfig {
                slot_minutes: g,
                respect_fixed_events: true,
            };
            assert!(cfg.validate().is_ok(), "{g} should be accepted");
        }
        for g in [0, 7, 50, 2880] {
            let cfg = OptimizerConfig {
                slot_minutes: g,
                respect_fixed_events: true,
            };
            assert!(cfg.validate().is_err(), "{g} should be rejected");
        }
    }

    #[test]
    fn file_roundtrip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let mut cfg = Config::default();
        cfg.set("calendar.calendar_id", "work@example.com").unwrap();
        cfg.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn invalid_file_is_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[optimizer]\nslot_minutes = 7\n").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}
