//! Command types for the klaxond protocol

use chrono::{DateTime, Local};
use klaxon_util::{AlarmId, ClientId};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{API_VERSION, AlarmKind, AlarmView, EngineStateSnapshot, HealthStatus};

/// Request wrapper with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Request ID for correlation
    pub request_id: u64,
    pub api_version: u32,
    pub command: Command,
}

impl Request {
    pub fn new(request_id: u64, command: Command) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            command,
        }
    }
}

/// Response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Corresponding request ID
    pub request_id: u64,
    pub api_version: u32,
    pub result: ResponseResult,
}

impl Response {
    pub fn success(request_id: u64, payload: ResponsePayload) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            result: ResponseResult::Ok(payload),
        }
    }

    pub fn error(request_id: u64, error: ErrorInfo) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            result: ResponseResult::Err(error),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseResult {
    Ok(ResponsePayload),
    Err(ErrorInfo),
}

/// Error information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Error codes for the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidRequest,
    AlarmNotFound,
    /// Dismiss/snooze on an alarm that is not firing, or similar
    InvalidTransition,
    /// Dismiss/snooze of "the primary" while nothing is firing
    NothingFiring,
    PermissionDenied,
    StoreError,
    InternalError,
}

/// All possible commands from clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Get current daemon state
    GetState,

    /// List all alarms in creation order
    ListAlarms,

    /// Create a new, unconfigured alarm
    CreateAlarm {
        /// Defaults to the configured label when absent
        #[serde(default)]
        label: Option<String>,
    },

    /// Set or replace the schedule of an alarm
    ConfigureAlarm { alarm_id: AlarmId, kind: AlarmKind },

    RenameAlarm { alarm_id: AlarmId, label: String },

    SetEnabled { alarm_id: AlarmId, enabled: bool },

    RemoveAlarm { alarm_id: AlarmId },

    /// Dismiss a firing alarm. Without an id, dismisses the primary.
    Dismiss {
        #[serde(default)]
        alarm_id: Option<AlarmId>,
    },

    /// Snooze a firing alarm. Without an id, snoozes the primary.
    Snooze {
        #[serde(default)]
        alarm_id: Option<AlarmId>,
    },

    /// Change the snooze duration given to newly created alarms
    SetDefaultSnooze { duration: Duration },

    /// Subscribe to events (returns immediately, events stream separately)
    SubscribeEvents,

    UnsubscribeEvents,

    GetHealth,

    /// Ping for keepalive
    Ping,
}

impl Command {
    /// Whether the command changes daemon state
    pub fn is_mutating(&self) -> bool {
        !matches!(
            self,
            Command::GetState
                | Command::ListAlarms
                | Command::SubscribeEvents
                | Command::UnsubscribeEvents
                | Command::GetHealth
                | Command::Ping
        )
    }
}

/// Response payloads
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponsePayload {
    State(EngineStateSnapshot),
    Alarms {
        alarms: Vec<AlarmView>,
    },
    Alarm(AlarmView),
    AlarmRemoved {
        alarm_id: AlarmId,
    },
    Dismissed {
        alarm_id: AlarmId,
        /// Next occurrence for recurring alarms, `None` once retired
        next_fire_time: Option<DateTime<Local>>,
    },
    Snoozed {
        alarm_id: AlarmId,
        until: DateTime<Local>,
    },
    DefaultSnoozeSet {
        duration: Duration,
    },
    Subscribed {
        client_id: ClientId,
    },
    Unsubscribed,
    Health(HealthStatus),
    Pong,
}
