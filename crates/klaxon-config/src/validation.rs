//! Configuration validation

use crate::schema::{RawAlarmPreset, RawConfig, RawSchedule};
use chrono::{DateTime, Local, Weekday};
use klaxon_util::{TimeOfDay, parse_local_datetime, parse_weekday};
use thiserror::Error;

/// Smallest accepted tick interval
pub const MIN_TICK_INTERVAL_MS: u64 = 100;
/// Largest accepted tick interval
pub const MAX_TICK_INTERVAL_MS: u64 = 60_000;
/// Longest accepted snooze (one day)
pub const MAX_SNOOZE_MINUTES: u64 = 24 * 60;

/// Validation error
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Alarm #{index}: {message}")]
    AlarmError { index: usize, message: String },

    #[error("Invalid time format '{value}': {message}")]
    InvalidTimeFormat { value: String, message: String },

    #[error("Invalid date-time '{0}': expected YYYY-MM-DD HH:MM[:SS]")]
    InvalidDateTime(String),

    #[error("Invalid day: {0}")]
    InvalidDay(String),

    #[error("Global config error: {0}")]
    GlobalError(String),
}

/// Validate a raw configuration
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if let Some(ms) = config.daemon.tick_interval_ms {
        if !(MIN_TICK_INTERVAL_MS..=MAX_TICK_INTERVAL_MS).contains(&ms) {
            errors.push(ValidationError::GlobalError(format!(
                "tick_interval_ms must be between {} and {}, got {}",
                MIN_TICK_INTERVAL_MS, MAX_TICK_INTERVAL_MS, ms
            )));
        }
    }

    if let Some(minutes) = config.defaults.snooze_minutes {
        if minutes == 0 || minutes > MAX_SNOOZE_MINUTES {
            errors.push(ValidationError::GlobalError(format!(
                "snooze_minutes must be between 1 and {}, got {}",
                MAX_SNOOZE_MINUTES, minutes
            )));
        }
    }

    if let Some(label) = &config.defaults.label {
        if label.trim().is_empty() {
            errors.push(ValidationError::GlobalError(
                "default label cannot be empty".into(),
            ));
        }
    }

    for (index, preset) in config.alarms.iter().enumerate() {
        errors.extend(validate_preset(index, preset));
    }

    errors
}

fn validate_preset(index: usize, preset: &RawAlarmPreset) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if let Some(label) = &preset.label {
        if label.trim().is_empty() {
            errors.push(ValidationError::AlarmError {
                index,
                message: "label cannot be empty".into(),
            });
        }
    }

    match &preset.schedule {
        RawSchedule::Once { at } => {
            if let Err(e) = parse_datetime(at) {
                errors.push(e);
            }
        }
        RawSchedule::Daily { time } => {
            if let Err(e) = parse_time(time) {
                errors.push(e);
            }
        }
        RawSchedule::Weekly { day, time } => {
            if let Err(e) = parse_day(day) {
                errors.push(e);
            }
            if let Err(e) = parse_time(time) {
                errors.push(e);
            }
        }
    }

    errors
}

/// Parse `HH:MM[:SS]`
pub fn parse_time(s: &str) -> Result<TimeOfDay, ValidationError> {
    s.parse()
        .map_err(|message| ValidationError::InvalidTimeFormat {
            value: s.to_string(),
            message,
        })
}

pub fn parse_day(s: &str) -> Result<Weekday, ValidationError> {
    parse_weekday(s).ok_or_else(|| ValidationError::InvalidDay(s.to_string()))
}

/// Parse `YYYY-MM-DD HH:MM[:SS]` in the host time zone
pub fn parse_datetime(s: &str) -> Result<DateTime<Local>, ValidationError> {
    parse_local_datetime(s).ok_or_else(|| ValidationError::InvalidDateTime(s.to_string()))
}
