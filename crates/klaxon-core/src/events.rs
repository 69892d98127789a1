//! Core events emitted by the engine

use chrono::{DateTime, Local};
use klaxon_api::FiringRole;
use klaxon_util::AlarmId;
use std::time::Duration;

/// Events emitted by alarm transitions and engine operations.
///
/// These stand in for sound and notification side effects; the daemon
/// forwards them to subscribed clients.
#[derive(Debug, Clone, PartialEq)]
pub enum CoreEvent {
    /// Alarm came due and started firing
    AlarmFired {
        alarm_id: AlarmId,
        label: String,
        role: FiringRole,
        scheduled_for: DateTime<Local>,
    },

    /// Secondary alarm took over the primary notification
    AlarmPromoted { alarm_id: AlarmId, label: String },

    AlarmDismissed {
        alarm_id: AlarmId,
        next_fire_time: Option<DateTime<Local>>,
        retired: bool,
    },

    AlarmSnoozed {
        alarm_id: AlarmId,
        until: DateTime<Local>,
    },

    /// Firing alarm stopped by an edit, disable, or removal
    AlarmSilenced { alarm_id: AlarmId },

    /// Alarm list or an alarm's settings changed
    AlarmsChanged { alarm_count: usize },

    DefaultSnoozeChanged { duration: Duration },
}
