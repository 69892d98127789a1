//! Validated configuration structures

use crate::schema::{RawAlarmPreset, RawConfig, RawDaemonConfig, RawDefaults, RawSchedule};
use crate::validation::{parse_datetime, parse_day, parse_time};
use crate::{ConfigError, ConfigResult, ValidationError};
use klaxon_api::AlarmKind;
use klaxon_util::{default_data_dir, default_socket_path};
use std::path::PathBuf;
use std::time::Duration;

/// Label given to alarms created without one
pub const DEFAULT_ALARM_LABEL: &str = "An alarm";
pub const DEFAULT_SNOOZE_MINUTES: u64 = 5;
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1000;

/// Validated configuration ready for use by the daemon
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub daemon: DaemonConfig,
    pub defaults: Defaults,
    /// Alarms seeded into a store that has never saved any
    pub alarms: Vec<AlarmPreset>,
}

impl Config {
    /// Convert from raw config (after validation)
    pub fn from_raw(raw: RawConfig) -> ConfigResult<Self> {
        let defaults = Defaults::from_raw(raw.defaults);

        let mut alarms = Vec::with_capacity(raw.alarms.len());
        let mut errors = Vec::new();
        for (index, preset) in raw.alarms.into_iter().enumerate() {
            match AlarmPreset::from_raw(preset, &defaults.label) {
                Ok(preset) => alarms.push(preset),
                Err(e) => errors.push(ValidationError::AlarmError {
                    index,
                    message: e.to_string(),
                }),
            }
        }
        if !errors.is_empty() {
            return Err(ConfigError::ValidationFailed { errors });
        }

        Ok(Self {
            daemon: DaemonConfig::from_raw(raw.daemon),
            defaults,
            alarms,
        })
    }
}

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub socket_path: PathBuf,
    pub data_dir: PathBuf,
    /// Period of the scan loop
    pub tick_interval: Duration,
}

impl DaemonConfig {
    fn from_raw(raw: RawDaemonConfig) -> Self {
        Self {
            socket_path: raw.socket_path.unwrap_or_else(default_socket_path),
            data_dir: raw.data_dir.unwrap_or_else(default_data_dir),
            tick_interval: Duration::from_millis(
                raw.tick_interval_ms.unwrap_or(DEFAULT_TICK_INTERVAL_MS),
            ),
        }
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self::from_raw(RawDaemonConfig::default())
    }
}

/// Settings applied to newly created alarms
#[derive(Debug, Clone)]
pub struct Defaults {
    pub snooze: Duration,
    pub label: String,
}

impl Defaults {
    fn from_raw(raw: RawDefaults) -> Self {
        Self {
            snooze: Duration::from_secs(raw.snooze_minutes.unwrap_or(DEFAULT_SNOOZE_MINUTES) * 60),
            label: raw.label.unwrap_or_else(|| DEFAULT_ALARM_LABEL.to_string()),
        }
    }
}

impl Default for Defaults {
    fn default() -> Self {
        Self::from_raw(RawDefaults::default())
    }
}

/// An alarm defined in the config file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmPreset {
    pub label: String,
    pub enabled: bool,
    pub kind: AlarmKind,
}

impl AlarmPreset {
    fn from_raw(raw: RawAlarmPreset, default_label: &str) -> Result<Self, ValidationError> {
        let kind = match raw.schedule {
            RawSchedule::Once { at } => AlarmKind::OneTime {
                fire_at: parse_datetime(&at)?,
            },
            RawSchedule::Daily { time } => AlarmKind::Daily {
                time: parse_time(&time)?,
            },
            RawSchedule::Weekly { day, time } => AlarmKind::Weekly {
                day: parse_day(&day)?,
                time: parse_time(&time)?,
            },
        };

        Ok(Self {
            label: raw.label.unwrap_or_else(|| default_label.to_string()),
            enabled: raw.enabled,
            kind,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;
    use klaxon_util::TimeOfDay;

    #[test]
    fn defaults_match_constants() {
        let defaults = Defaults::default();
        assert_eq!(defaults.snooze, Duration::from_secs(300));
        assert_eq!(defaults.label, "An alarm");

        let daemon = DaemonConfig::default();
        assert_eq!(daemon.tick_interval, Duration::from_secs(1));
    }

    #[test]
    fn preset_uses_default_label() {
        let raw = RawAlarmPreset {
            label: None,
            enabled: true,
            schedule: RawSchedule::Weekly {
                day: "tue".into(),
                time: "06:15".into(),
            },
        };

        let preset = AlarmPreset::from_raw(raw, "Beep").unwrap();
        assert_eq!(preset.label, "Beep");
        assert_eq!(
            preset.kind,
            AlarmKind::Weekly {
                day: Weekday::Tue,
                time: TimeOfDay::hm(6, 15).unwrap(),
            }
        );
    }
}
