//! Store trait definitions

use chrono::{DateTime, Local};
use klaxon_api::{AlarmKind, AlarmState};
use klaxon_util::AlarmId;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{AuditEvent, StoreResult};

/// Main store trait
pub trait Store: Send + Sync {
    // Audit log

    fn append_audit(&self, event: AuditEvent) -> StoreResult<()>;

    /// Most recent first
    fn get_recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>>;

    // Alarms

    /// Load the saved alarm list. `None` if alarms were never saved.
    fn load_alarms(&self) -> StoreResult<Option<Vec<AlarmRecord>>>;

    /// Replace the saved alarm list
    fn save_alarms(&self, alarms: &[AlarmRecord]) -> StoreResult<()>;

    // Settings

    fn get_default_snooze(&self) -> StoreResult<Option<Duration>>;

    fn set_default_snooze(&self, duration: Duration) -> StoreResult<()>;

    // Health

    fn is_healthy(&self) -> bool;
}

/// A configured alarm as persisted.
///
/// Unconfigured alarms have no fire times and are never saved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmRecord {
    pub id: AlarmId,
    pub label: String,
    pub kind: AlarmKind,
    pub default_fire_time: DateTime<Local>,
    pub current_fire_time: DateTime<Local>,
    pub snooze_duration: Duration,
    pub enabled: bool,
    /// Firing state at save time, so a notification left open is reopened
    #[serde(default)]
    pub state: AlarmState,
}
