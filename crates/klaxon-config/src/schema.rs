//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    #[serde(default)]
    pub daemon: RawDaemonConfig,

    /// Settings applied to newly created alarms
    #[serde(default)]
    pub defaults: RawDefaults,

    /// Alarms created when the store has never held any
    #[serde(default)]
    pub alarms: Vec<RawAlarmPreset>,
}

/// Daemon-level settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawDaemonConfig {
    /// IPC socket path (default: $XDG_RUNTIME_DIR/klaxon/klaxond.sock)
    pub socket_path: Option<PathBuf>,

    /// Data directory for store
    pub data_dir: Option<PathBuf>,

    /// How often the daemon scans alarms, in milliseconds
    pub tick_interval_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawDefaults {
    pub snooze_minutes: Option<u64>,
    pub label: Option<String>,
}

/// Raw alarm preset
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawAlarmPreset {
    pub label: Option<String>,

    #[serde(default = "default_true")]
    pub enabled: bool,

    pub schedule: RawSchedule,
}

/// Raw schedule, kept as strings until validation
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RawSchedule {
    /// `at = "YYYY-MM-DD HH:MM[:SS]"`
    Once { at: String },
    /// `time = "HH:MM[:SS]"`
    Daily { time: String },
    /// `day = "mon"`, `time = "HH:MM[:SS]"`
    Weekly { day: String, time: String },
}

fn default_true() -> bool {
    true
}
