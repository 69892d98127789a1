//! Audit event types

use chrono::{DateTime, Local};
use klaxon_api::FiringRole;
use klaxon_util::AlarmId;
use serde::{Deserialize, Serialize};

/// Types of audit events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEventType {
    DaemonStarted,

    DaemonStopped,

    /// Config loaded at startup
    ConfigLoaded { preset_count: usize },

    /// Presets seeded into an empty store
    AlarmsSeeded { count: usize },

    AlarmCreated { alarm_id: AlarmId, label: String },

    /// Schedule set or replaced
    AlarmConfigured {
        alarm_id: AlarmId,
        summary: String,
        fire_at: DateTime<Local>,
    },

    AlarmRenamed { alarm_id: AlarmId, label: String },

    AlarmEnabledChanged { alarm_id: AlarmId, enabled: bool },

    AlarmRemoved { alarm_id: AlarmId },

    AlarmFired { alarm_id: AlarmId, role: FiringRole },

    AlarmPromoted { alarm_id: AlarmId },

    AlarmDismissed {
        alarm_id: AlarmId,
        /// One-time alarm disabled by the dismiss
        retired: bool,
    },

    AlarmSnoozed {
        alarm_id: AlarmId,
        until: DateTime<Local>,
    },

    DefaultSnoozeChanged { seconds: u64 },

    ClientConnected {
        client_id: String,
        role: String,
        uid: Option<u32>,
    },

    ClientDisconnected { client_id: String },
}

/// Full audit event with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event ID
    pub id: i64,

    pub timestamp: DateTime<Local>,

    pub event: AuditEventType,
}

impl AuditEvent {
    pub fn new(event: AuditEventType) -> Self {
        Self {
            id: 0, // Will be set by store
            timestamp: klaxon_util::now(),
            event,
        }
    }
}
