//! Shared types for the klaxon API

use chrono::{DateTime, Local, Weekday};
use klaxon_util::{AlarmId, ClientId, TimeOfDay, format_datetime_full, weekday_name};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How an alarm recurs. Fixed at creation/edit time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AlarmKind {
    /// Fires once at an absolute local instant
    OneTime { fire_at: DateTime<Local> },
    /// Fires every day at a time of day
    Daily { time: TimeOfDay },
    /// Fires every week on a day at a time of day
    Weekly { day: Weekday, time: TimeOfDay },
}

impl AlarmKind {
    /// Calendar days between firings, `None` for one-time alarms
    pub fn period_days(&self) -> Option<u64> {
        match self {
            AlarmKind::OneTime { .. } => None,
            AlarmKind::Daily { .. } => Some(1),
            AlarmKind::Weekly { .. } => Some(7),
        }
    }

    pub fn is_recurring(&self) -> bool {
        self.period_days().is_some()
    }

    /// Short description shown next to the alarm in a list
    pub fn summary(&self) -> String {
        match self {
            AlarmKind::OneTime { .. } => "No repeat".into(),
            AlarmKind::Daily { .. } => "Daily".into(),
            AlarmKind::Weekly { day, .. } => weekday_name(*day).into(),
        }
    }

    /// Human-readable "when" for the alarm list
    pub fn describe_time(&self) -> String {
        match self {
            AlarmKind::OneTime { fire_at } => format_datetime_full(fire_at),
            AlarmKind::Daily { time } | AlarmKind::Weekly { time, .. } => time.to_string(),
        }
    }
}

/// Role of a firing alarm among all alarms firing at once
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FiringRole {
    /// Owns the main notification surface
    Primary,
    /// Queued silently until promoted
    Secondary,
}

/// Scheduling state of an alarm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AlarmState {
    #[default]
    Idle,
    Firing(FiringRole),
}

impl AlarmState {
    pub fn is_firing(&self) -> bool {
        matches!(self, AlarmState::Firing(_))
    }

    pub fn role(&self) -> Option<FiringRole> {
        match self {
            AlarmState::Idle => None,
            AlarmState::Firing(role) => Some(*role),
        }
    }
}

/// View of an alarm for UI display
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlarmView {
    pub alarm_id: AlarmId,
    pub label: String,
    /// `None` until the alarm has been configured
    pub kind: Option<AlarmKind>,
    /// "Not set", "No repeat", "Daily", or a weekday name
    pub summary: String,
    pub enabled: bool,
    pub initialized: bool,
    pub state: AlarmState,
    pub default_fire_time: Option<DateTime<Local>>,
    pub current_fire_time: Option<DateTime<Local>>,
    /// True while the current fire time was moved by a snooze
    pub snoozed: bool,
    pub snooze_duration: Duration,
}

/// Full engine state snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStateSnapshot {
    pub api_version: u32,
    pub alarm_count: usize,
    /// Alarm currently owning the primary notification
    pub primary: Option<AlarmId>,
    pub primary_notification_open: bool,
    /// Snooze duration given to newly created alarms
    pub default_snooze: Duration,
    #[serde(default)]
    pub alarms: Vec<AlarmView>,
}

/// Role for authorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientRole {
    /// Same user as the daemon (or root): may edit, dismiss, and snooze
    Owner,
    /// Any other local user: read-only
    Observer,
}

impl ClientRole {
    pub fn can_modify(&self) -> bool {
        matches!(self, ClientRole::Owner)
    }
}

/// Client connection info (set by IPC layer)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientInfo {
    pub client_id: ClientId,
    pub role: ClientRole,
    /// Unix UID if available
    pub uid: Option<u32>,
}

impl ClientInfo {
    pub fn new(role: ClientRole) -> Self {
        Self {
            client_id: ClientId::new(),
            role,
            uid: None,
        }
    }

    pub fn with_uid(mut self, uid: u32) -> Self {
        self.uid = Some(uid);
        self
    }
}

/// Health status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub live: bool,
    pub ready: bool,
    pub store_ok: bool,
}
