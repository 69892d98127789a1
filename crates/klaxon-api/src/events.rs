//! Event types for klaxond -> client streaming

use chrono::{DateTime, Local};
use klaxon_util::AlarmId;
use serde::{Deserialize, Serialize};

use crate::{API_VERSION, EngineStateSnapshot, FiringRole};

/// Event envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub api_version: u32,
    pub timestamp: DateTime<Local>,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(payload: EventPayload) -> Self {
        Self {
            api_version: API_VERSION,
            timestamp: klaxon_util::now(),
            payload,
        }
    }
}

/// All possible events from the daemon to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// Full state snapshot (sent on subscribe and after every change)
    StateChanged(EngineStateSnapshot),

    /// An alarm came due and started firing
    AlarmFired {
        alarm_id: AlarmId,
        label: String,
        role: FiringRole,
        scheduled_for: DateTime<Local>,
    },

    /// A secondary alarm took over the primary notification
    AlarmPromoted { alarm_id: AlarmId, label: String },

    AlarmDismissed {
        alarm_id: AlarmId,
        /// Next occurrence for recurring alarms
        next_fire_time: Option<DateTime<Local>>,
        /// True when a one-time alarm was disabled by the dismiss
        retired: bool,
    },

    AlarmSnoozed {
        alarm_id: AlarmId,
        until: DateTime<Local>,
    },

    /// A firing alarm was stopped without dismiss or snooze (disabled, rescheduled, removed)
    AlarmSilenced { alarm_id: AlarmId },

    /// The alarm list changed (create, configure, rename, enable, remove)
    AlarmsChanged { alarm_count: usize },

    /// Daemon is shutting down
    Shutdown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serialization() {
        let event = Event::new(EventPayload::AlarmFired {
            alarm_id: AlarmId::new(),
            label: "Wake up".into(),
            role: FiringRole::Primary,
            scheduled_for: klaxon_util::now(),
        });

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"alarm_fired\""));

        let parsed: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.api_version, API_VERSION);
        assert!(matches!(
            parsed.payload,
            EventPayload::AlarmFired {
                role: FiringRole::Primary,
                ..
            }
        ));
    }

    #[test]
    fn dismissed_one_time_has_no_next_fire() {
        let event = Event::new(EventPayload::AlarmDismissed {
            alarm_id: AlarmId::new(),
            next_fire_time: None,
            retired: true,
        });

        let json = serde_json::to_string(&event).unwrap();
        let parsed: Event = serde_json::from_str(&json).unwrap();

        if let EventPayload::AlarmDismissed {
            next_fire_time,
            retired,
            ..
        } = parsed.payload
        {
            assert!(next_fire_time.is_none());
            assert!(retired);
        } else {
            panic!("Expected AlarmDismissed");
        }
    }
}
