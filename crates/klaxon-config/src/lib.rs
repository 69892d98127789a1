//! Configuration parsing and validation for klaxond
//!
//! Supports TOML configuration with:
//! - Versioned schema
//! - Daemon paths and tick interval
//! - Default snooze duration and label for new alarms
//! - Preset alarms seeded into an empty store
//! - Validation with clear error messages

mod schema;
mod settings;
mod validation;

pub use schema::*;
pub use settings::*;
pub use validation::*;

use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation failed: {errors:?}")]
    ValidationFailed { errors: Vec<ValidationError> },

    #[error("Unsupported config version: {0}")]
    UnsupportedVersion(u32),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Current supported config version
pub const CURRENT_CONFIG_VERSION: u32 = 1;

/// Load and validate configuration from a TOML file
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Like [`load_config`], but a missing file yields the built-in defaults
pub fn load_config_or_default(path: impl AsRef<Path>) -> ConfigResult<Config> {
    let path = path.as_ref();
    if !path.exists() {
        info!(path = %path.display(), "No config file, using defaults");
        return Ok(Config::default());
    }
    debug!(path = %path.display(), "Loading config");
    load_config(path)
}

/// Parse and validate configuration from a TOML string
pub fn parse_config(content: &str) -> ConfigResult<Config> {
    let raw: RawConfig = toml::from_str(content)?;

    if raw.config_version != CURRENT_CONFIG_VERSION {
        return Err(ConfigError::UnsupportedVersion(raw.config_version));
    }

    let errors = validate_config(&raw);
    if !errors.is_empty() {
        return Err(ConfigError::ValidationFailed { errors });
    }

    Config::from_raw(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use klaxon_api::AlarmKind;
    use std::io::Write;
    use std::time::Duration;

    #[test]
    fn parse_minimal_config() {
        let config = Config::default();
        let parsed = parse_config("config_version = 1").unwrap();

        assert!(parsed.alarms.is_empty());
        assert_eq!(parsed.defaults.snooze, config.defaults.snooze);
        assert_eq!(parsed.defaults.label, DEFAULT_ALARM_LABEL);
    }

    #[test]
    fn parse_full_config() {
        let config = r#"
            config_version = 1

            [daemon]
            socket_path = "/tmp/klaxon-test/klaxond.sock"
            data_dir = "/tmp/klaxon-test/data"
            tick_interval_ms = 250

            [defaults]
            snooze_minutes = 9
            label = "Alarm"

            [[alarms]]
            label = "Wake up"
            schedule = { type = "weekly", day = "mon", time = "07:30" }

            [[alarms]]
            enabled = false
            schedule = { type = "daily", time = "22:00" }
        "#;

        let parsed = parse_config(config).unwrap();
        assert_eq!(parsed.daemon.tick_interval, Duration::from_millis(250));
        assert_eq!(parsed.defaults.snooze, Duration::from_secs(9 * 60));
        assert_eq!(parsed.alarms.len(), 2);
        assert_eq!(parsed.alarms[0].label, "Wake up");
        assert!(parsed.alarms[0].enabled);
        assert!(matches!(parsed.alarms[0].kind, AlarmKind::Weekly { .. }));
        assert_eq!(parsed.alarms[1].label, "Alarm");
        assert!(!parsed.alarms[1].enabled);
    }

    #[test]
    fn reject_wrong_version() {
        let result = parse_config("config_version = 99");
        assert!(matches!(result, Err(ConfigError::UnsupportedVersion(99))));
    }

    #[test]
    fn reject_invalid_preset() {
        let config = r#"
            config_version = 1

            [[alarms]]
            schedule = { type = "daily", time = "25:00" }
        "#;

        let result = parse_config(config);
        assert!(matches!(result, Err(ConfigError::ValidationFailed { .. })));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_or_default(dir.path().join("absent.toml")).unwrap();
        assert!(config.alarms.is_empty());
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "config_version = 1\n[defaults]\nsnooze_minutes = 1").unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.defaults.snooze, Duration::from_secs(60));
    }
}
