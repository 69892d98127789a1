//! Alarm entity and its lifecycle state machine
//!
//! ```text
//!   Idle --fire(Primary)----> Firing(Primary)
//!   Idle --fire(Secondary)--> Firing(Secondary) --promote--> Firing(Primary)
//!   Firing(*) --dismiss | snooze--> Idle
//! ```
//!
//! Disabling a firing alarm returns it to `Idle` and keeps its anchor.
//! Re-scheduling a firing alarm returns it to `Idle` with a fresh anchor.

use chrono::{DateTime, Local, Weekday};
use klaxon_api::{AlarmKind, AlarmState, AlarmView, FiringRole};
use klaxon_store::AlarmRecord;
use klaxon_util::{AlarmId, KlaxonError, Result, TimeOfDay};
use std::time::Duration;
use tracing::{debug, error, info};

use crate::CoreEvent;
use crate::schedule;

/// Shown in place of a summary for alarms that have no schedule yet
pub const NOT_SET_SUMMARY: &str = "Not set";

/// Schedule of a configured alarm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FireSchedule {
    pub kind: AlarmKind,
    /// Anchor for the current cycle; moves only on dismiss or reconfigure
    pub default_fire_time: DateTime<Local>,
    /// When the alarm will actually go off; differs from the anchor while snoozed
    pub current_fire_time: DateTime<Local>,
}

/// A single alarm
#[derive(Debug, Clone)]
pub struct Alarm {
    id: AlarmId,
    label: String,
    schedule: Option<FireSchedule>,
    snooze_duration: Duration,
    enabled: bool,
    state: AlarmState,
}

impl Alarm {
    /// New placeholder alarm: no schedule, disabled.
    pub fn new(label: impl Into<String>, snooze_duration: Duration) -> Self {
        Self {
            id: AlarmId::new(),
            label: label.into(),
            schedule: None,
            snooze_duration,
            enabled: false,
            state: AlarmState::Idle,
        }
    }

    pub fn id(&self) -> &AlarmId {
        &self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = label.into();
    }

    pub fn kind(&self) -> Option<&AlarmKind> {
        self.schedule.as_ref().map(|s| &s.kind)
    }

    pub fn schedule(&self) -> Option<&FireSchedule> {
        self.schedule.as_ref()
    }

    pub fn default_fire_time(&self) -> Option<DateTime<Local>> {
        self.schedule.as_ref().map(|s| s.default_fire_time)
    }

    pub fn current_fire_time(&self) -> Option<DateTime<Local>> {
        self.schedule.as_ref().map(|s| s.current_fire_time)
    }

    pub fn snooze_duration(&self) -> Duration {
        self.snooze_duration
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_initialized(&self) -> bool {
        self.schedule.is_some()
    }

    pub fn state(&self) -> AlarmState {
        self.state
    }

    pub fn is_snoozed(&self) -> bool {
        self.schedule
            .as_ref()
            .is_some_and(|s| s.current_fire_time != s.default_fire_time)
    }

    /// Install a new schedule of any kind. See [`Alarm::set_one_time`].
    pub fn configure(&mut self, kind: AlarmKind, now: DateTime<Local>) -> Option<CoreEvent> {
        let fire_at = schedule::initial_fire_time(&kind, now);
        let silenced = self.silence();

        info!(
            alarm_id = %self.id,
            summary = %kind.summary(),
            fire_at = %fire_at,
            "Alarm configured"
        );

        self.schedule = Some(FireSchedule {
            kind,
            default_fire_time: fire_at,
            current_fire_time: fire_at,
        });
        silenced
    }

    /// Fire once at `at`. A past instant fires on the next scan.
    ///
    /// `enabled` is left alone. If the alarm was firing it is silenced and
    /// the returned event says so.
    pub fn set_one_time(&mut self, at: DateTime<Local>) -> Option<CoreEvent> {
        self.configure(AlarmKind::OneTime { fire_at: at }, at)
    }

    pub fn set_daily(&mut self, time: TimeOfDay, now: DateTime<Local>) -> Option<CoreEvent> {
        self.configure(AlarmKind::Daily { time }, now)
    }

    pub fn set_weekly(
        &mut self,
        day: Weekday,
        time: TimeOfDay,
        now: DateTime<Local>,
    ) -> Option<CoreEvent> {
        self.configure(AlarmKind::Weekly { day, time }, now)
    }

    /// Disabling a firing alarm silences it; the schedule is kept.
    pub fn set_enabled(&mut self, enabled: bool) -> Option<CoreEvent> {
        self.enabled = enabled;
        if enabled {
            None
        } else {
            self.silence()
        }
    }

    /// Whether the arbitrator should fire this alarm at `now`
    pub fn is_due(&self, now: DateTime<Local>) -> bool {
        match &self.schedule {
            Some(schedule) => {
                self.enabled
                    && self.state == AlarmState::Idle
                    && schedule.current_fire_time <= now
            }
            None => false,
        }
    }

    /// `Idle -> Firing(role)`
    pub fn fire(&mut self, now: DateTime<Local>, role: FiringRole) -> Result<CoreEvent> {
        if self.state.is_firing() {
            error!(
                alarm_id = %self.id,
                state = ?self.state,
                "Attempted to fire an alarm that is already firing"
            );
            return Err(KlaxonError::AlreadyFiring(self.id.clone()));
        }

        let scheduled_for = self
            .current_fire_time()
            .ok_or_else(|| KlaxonError::validation(format!("alarm {} has no schedule", self.id)))?;

        self.state = AlarmState::Firing(role);
        info!(
            alarm_id = %self.id,
            label = %self.label,
            role = ?role,
            scheduled_for = %scheduled_for,
            late_by_secs = (now - scheduled_for).num_seconds(),
            "Alarm fired"
        );

        Ok(CoreEvent::AlarmFired {
            alarm_id: self.id.clone(),
            label: self.label.clone(),
            role,
            scheduled_for,
        })
    }

    /// `Firing(Secondary) -> Firing(Primary)`
    pub(crate) fn promote(&mut self) -> Result<CoreEvent> {
        if self.state != AlarmState::Firing(FiringRole::Secondary) {
            return Err(KlaxonError::NotFiring(self.id.clone()));
        }

        self.state = AlarmState::Firing(FiringRole::Primary);
        info!(alarm_id = %self.id, label = %self.label, "Alarm promoted to primary");

        Ok(CoreEvent::AlarmPromoted {
            alarm_id: self.id.clone(),
            label: self.label.clone(),
        })
    }

    pub(crate) fn demote(&mut self) {
        if self.state == AlarmState::Firing(FiringRole::Primary) {
            self.state = AlarmState::Firing(FiringRole::Secondary);
        }
    }

    /// `Firing(*) -> Idle`, re-arming recurring alarms one period after the
    /// previous anchor and disabling one-time alarms.
    pub fn dismiss(&mut self, now: DateTime<Local>) -> Result<CoreEvent> {
        if !self.state.is_firing() {
            return Err(KlaxonError::NotFiring(self.id.clone()));
        }
        let Some(schedule) = self.schedule.as_mut() else {
            return Err(KlaxonError::NotFiring(self.id.clone()));
        };

        let next_fire_time = schedule::advance(&schedule.kind, schedule.default_fire_time);
        let retired = match next_fire_time {
            Some(next) => {
                schedule.default_fire_time = next;
                false
            }
            None => {
                self.enabled = false;
                true
            }
        };
        schedule.current_fire_time = schedule.default_fire_time;
        self.state = AlarmState::Idle;

        info!(
            alarm_id = %self.id,
            next_fire_time = ?next_fire_time,
            retired,
            dismissed_at = %now,
            "Alarm dismissed"
        );

        Ok(CoreEvent::AlarmDismissed {
            alarm_id: self.id.clone(),
            next_fire_time,
            retired,
        })
    }

    /// `Firing(*) -> Idle`, going off again `snooze_duration` after `now`.
    pub fn snooze(&mut self, now: DateTime<Local>) -> Result<CoreEvent> {
        if !self.state.is_firing() {
            return Err(KlaxonError::NotFiring(self.id.clone()));
        }
        let Some(schedule) = self.schedule.as_mut() else {
            return Err(KlaxonError::NotFiring(self.id.clone()));
        };

        let snooze = chrono::Duration::from_std(self.snooze_duration)
            .map_err(|e| KlaxonError::internal(format!("snooze duration out of range: {}", e)))?;
        let until = now.checked_add_signed(snooze).ok_or_else(|| {
            KlaxonError::validation(format!(
                "snoozing {} past {} leaves the calendar",
                self.id, now
            ))
        })?;
        schedule.current_fire_time = until;
        self.state = AlarmState::Idle;

        info!(alarm_id = %self.id, until = %until, "Alarm snoozed");

        Ok(CoreEvent::AlarmSnoozed {
            alarm_id: self.id.clone(),
            until,
        })
    }

    /// Stop firing without dismiss or snooze semantics
    pub(crate) fn silence(&mut self) -> Option<CoreEvent> {
        if !self.state.is_firing() {
            return None;
        }
        debug!(alarm_id = %self.id, state = ?self.state, "Alarm silenced");
        self.state = AlarmState::Idle;
        Some(CoreEvent::AlarmSilenced {
            alarm_id: self.id.clone(),
        })
    }

    /// Persistable form. `None` for alarms that were never configured.
    pub fn to_record(&self) -> Option<AlarmRecord> {
        let schedule = self.schedule.as_ref()?;
        Some(AlarmRecord {
            id: self.id.clone(),
            label: self.label.clone(),
            kind: schedule.kind.clone(),
            default_fire_time: schedule.default_fire_time,
            current_fire_time: schedule.current_fire_time,
            snooze_duration: self.snooze_duration,
            enabled: self.enabled,
            state: self.state,
        })
    }

    pub fn from_record(record: AlarmRecord) -> Self {
        // A disabled alarm cannot be firing
        let state = if record.enabled {
            record.state
        } else {
            AlarmState::Idle
        };

        Self {
            id: record.id,
            label: record.label,
            schedule: Some(FireSchedule {
                kind: record.kind,
                default_fire_time: record.default_fire_time,
                current_fire_time: record.current_fire_time,
            }),
            snooze_duration: record.snooze_duration,
            enabled: record.enabled,
            state,
        }
    }

    /// View for clients
    pub fn view(&self) -> AlarmView {
        AlarmView {
            alarm_id: self.id.clone(),
            label: self.label.clone(),
            kind: self.kind().cloned(),
            summary: self
                .kind()
                .map(|k| k.summary())
                .unwrap_or_else(|| NOT_SET_SUMMARY.to_string()),
            enabled: self.enabled,
            initialized: self.is_initialized(),
            state: self.state,
            default_fire_time: self.default_fire_time(),
            current_fire_time: self.current_fire_time(),
            snoozed: self.is_snoozed(),
            snooze_duration: self.snooze_duration,
        }
    }
}
