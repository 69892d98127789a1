//! Firing arbitration
//!
//! Decides which due alarms start firing on each scan and which of them
//! owns the primary notification. Ties are broken by collection order.

use chrono::{DateTime, Local};
use klaxon_api::{AlarmState, FiringRole};
use klaxon_util::AlarmId;
use tracing::{debug, info, warn};

use crate::{AlarmCollection, CoreEvent};

/// Outcome of one scan
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    /// Alarm that started firing as primary during this scan
    pub newly_primary: Option<AlarmId>,
    /// Alarms that started firing as secondary, in collection order
    pub newly_secondary: Vec<AlarmId>,
    /// Secondary alarm promoted to primary at the start of this scan
    pub promoted: Option<AlarmId>,
    pub events: Vec<CoreEvent>,
}

impl ScanResult {
    /// True when the scan changed no alarm
    pub fn is_empty(&self) -> bool {
        self.newly_primary.is_none() && self.newly_secondary.is_empty() && self.promoted.is_none()
    }
}

/// Tracks whether the primary notification is open and which alarm owns it
#[derive(Debug, Clone, Default)]
pub struct FiringArbitrator {
    primary_notification_open: bool,
    primary: Option<AlarmId>,
}

impl FiringArbitrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild arbitration state from a restored collection.
    ///
    /// An alarm saved as primary reopens the notification. Extra primaries are
    /// demoted to secondary. If only secondaries were firing, the flag is left
    /// open with no owner so the next scan promotes the first of them.
    pub fn restore(alarms: &mut AlarmCollection) -> Self {
        let mut arbiter = Self::new();

        for alarm in alarms.iter_mut() {
            match alarm.state() {
                AlarmState::Firing(FiringRole::Primary) if arbiter.primary.is_none() => {
                    arbiter.primary = Some(alarm.id().clone());
                    arbiter.primary_notification_open = true;
                }
                AlarmState::Firing(FiringRole::Primary) => {
                    warn!(alarm_id = %alarm.id(), "Demoting extra primary alarm on restore");
                    alarm.demote();
                }
                AlarmState::Firing(FiringRole::Secondary) => {
                    arbiter.primary_notification_open = true;
                }
                AlarmState::Idle => {}
            }
        }

        if arbiter.primary_notification_open {
            info!(primary = ?arbiter.primary, "Restored open notification");
        }
        arbiter
    }

    pub fn is_primary_open(&self) -> bool {
        self.primary_notification_open
    }

    /// Alarm recorded as owning the primary notification
    pub fn primary(&self) -> Option<&AlarmId> {
        self.primary.as_ref()
    }

    /// Run one arbitration pass at `now`. Never fails.
    pub fn scan(&mut self, now: DateTime<Local>, alarms: &mut AlarmCollection) -> ScanResult {
        let mut result = ScanResult::default();

        self.check_promotion(alarms, &mut result);

        let due: Vec<AlarmId> = alarms
            .iter()
            .filter(|a| a.is_due(now))
            .map(|a| a.id().clone())
            .collect();

        for id in due {
            let Some(alarm) = alarms.get_mut(&id) else {
                continue;
            };

            let role = if self.primary_notification_open {
                FiringRole::Secondary
            } else {
                FiringRole::Primary
            };

            match alarm.fire(now, role) {
                Ok(event) => {
                    result.events.push(event);
                    match role {
                        FiringRole::Primary => {
                            self.primary_notification_open = true;
                            self.primary = Some(id.clone());
                            result.newly_primary = Some(id);
                        }
                        FiringRole::Secondary => result.newly_secondary.push(id),
                    }
                }
                Err(e) => warn!(alarm_id = %id, error = %e, "Skipping alarm during scan"),
            }
        }

        if !result.is_empty() {
            debug!(
                newly_primary = ?result.newly_primary,
                newly_secondary = result.newly_secondary.len(),
                promoted = ?result.promoted,
                "Scan complete"
            );
        }

        result
    }

    /// Hand the notification to the next secondary once the primary has
    /// stopped firing for any reason, or close it if nothing is queued.
    fn check_promotion(&mut self, alarms: &mut AlarmCollection, result: &mut ScanResult) {
        if !self.primary_notification_open {
            return;
        }

        let primary_still_firing = self
            .primary
            .as_ref()
            .and_then(|id| alarms.get(id))
            .is_some_and(|a| a.state() == AlarmState::Firing(FiringRole::Primary));
        if primary_still_firing {
            return;
        }

        let next = alarms
            .ids_in_state(AlarmState::Firing(FiringRole::Secondary))
            .into_iter()
            .next();

        let promoted = next.and_then(|id| {
            let alarm = alarms.get_mut(&id)?;
            match alarm.promote() {
                Ok(event) => Some((id, event)),
                Err(e) => {
                    warn!(alarm_id = %id, error = %e, "Promotion failed");
                    None
                }
            }
        });

        match promoted {
            Some((id, event)) => {
                self.primary = Some(id.clone());
                result.promoted = Some(id);
                result.events.push(event);
            }
            None => {
                debug!("Primary notification closed");
                self.primary_notification_open = false;
                self.primary = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Alarm;
    use chrono::TimeZone;
    use klaxon_util::TimeOfDay;
    use std::time::Duration;

    fn at(h: u32, m: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 1, 15, h, m, 0).unwrap()
    }

    fn one_time(label: &str, fire_at: DateTime<Local>) -> Alarm {
        let mut alarm = Alarm::new(label, Duration::from_secs(300));
        alarm.set_one_time(fire_at);
        alarm.set_enabled(true);
        alarm
    }

    fn primaries(alarms: &AlarmCollection) -> usize {
        alarms
            .iter()
            .filter(|a| a.state() == AlarmState::Firing(FiringRole::Primary))
            .count()
    }

    #[test]
    fn nothing_due_nothing_fires() {
        let mut alarms = AlarmCollection::new();
        alarms.push(one_time("later", at(9, 0)));
        let mut arbiter = FiringArbitrator::new();

        let result = arbiter.scan(at(8, 0), &mut alarms);
        assert!(result.is_empty());
        assert!(result.events.is_empty());
        assert!(!arbiter.is_primary_open());
    }

    #[test]
    fn simultaneous_alarms_first_is_primary() {
        let mut alarms = AlarmCollection::new();
        let a = one_time("A", at(7, 0));
        let b = one_time("B", at(6, 30));
        let (a_id, b_id) = (a.id().clone(), b.id().clone());
        alarms.push(a);
        alarms.push(b);

        let mut arbiter = FiringArbitrator::new();
        let result = arbiter.scan(at(7, 0), &mut alarms);

        // Insertion order wins, not the earlier fire time
        assert_eq!(result.newly_primary, Some(a_id.clone()));
        assert_eq!(result.newly_secondary, vec![b_id.clone()]);
        assert_eq!(result.events.len(), 2);
        assert_eq!(primaries(&alarms), 1);
        assert_eq!(arbiter.primary(), Some(&a_id));
    }

    #[test]
    fn dismissing_primary_promotes_next_secondary() {
        let mut alarms = AlarmCollection::new();
        let a = one_time("A", at(7, 0));
        let b = one_time("B", at(7, 0));
        let (a_id, b_id) = (a.id().clone(), b.id().clone());
        alarms.push(a);
        alarms.push(b);

        let mut arbiter = FiringArbitrator::new();
        arbiter.scan(at(7, 0), &mut alarms);

        alarms.get_mut(&a_id).unwrap().dismiss(at(7, 1)).unwrap();
        let result = arbiter.scan(at(7, 1), &mut alarms);

        assert_eq!(result.promoted, Some(b_id.clone()));
        assert!(matches!(
            result.events[0],
            CoreEvent::AlarmPromoted { .. }
        ));
        assert_eq!(arbiter.primary(), Some(&b_id));
        assert_eq!(primaries(&alarms), 1);

        alarms.get_mut(&b_id).unwrap().dismiss(at(7, 2)).unwrap();
        let result = arbiter.scan(at(7, 2), &mut alarms);
        assert!(result.promoted.is_none());
        assert!(!arbiter.is_primary_open());
    }

    #[test]
    fn new_alarm_while_primary_open_is_secondary() {
        let mut alarms = AlarmCollection::new();
        let a = one_time("A", at(7, 0));
        let b = one_time("B", at(7, 10));
        let b_id = b.id().clone();
        alarms.push(a);
        alarms.push(b);

        let mut arbiter = FiringArbitrator::new();
        arbiter.scan(at(7, 0), &mut alarms);
        let result = arbiter.scan(at(7, 10), &mut alarms);

        assert!(result.newly_primary.is_none());
        assert_eq!(result.newly_secondary, vec![b_id]);
        assert_eq!(primaries(&alarms), 1);
    }

    #[test]
    fn snoozed_primary_hands_over_and_refires_as_secondary() {
        let mut alarms = AlarmCollection::new();
        let a = one_time("A", at(7, 0));
        let b = one_time("B", at(7, 0));
        let (a_id, b_id) = (a.id().clone(), b.id().clone());
        alarms.push(a);
        alarms.push(b);

        let mut arbiter = FiringArbitrator::new();
        arbiter.scan(at(7, 0), &mut alarms);
        alarms.get_mut(&a_id).unwrap().snooze(at(7, 0)).unwrap();

        let result = arbiter.scan(at(7, 5), &mut alarms);
        assert_eq!(result.promoted, Some(b_id));
        assert_eq!(result.newly_secondary, vec![a_id]);
        assert_eq!(primaries(&alarms), 1);
    }

    #[test]
    fn stalled_scan_fires_each_overdue_alarm_once() {
        let mut alarms = AlarmCollection::new();
        for h in 1..=4 {
            alarms.push(one_time("overdue", at(h, 0)));
        }

        let mut arbiter = FiringArbitrator::new();
        let result = arbiter.scan(at(12, 0), &mut alarms);
        assert!(result.newly_primary.is_some());
        assert_eq!(result.newly_secondary.len(), 3);

        let result = arbiter.scan(at(12, 1), &mut alarms);
        assert!(result.is_empty());
    }

    #[test]
    fn disabled_and_unconfigured_never_fire() {
        let mut alarms = AlarmCollection::new();
        let mut disabled = one_time("disabled", at(7, 0));
        disabled.set_enabled(false);
        alarms.push(disabled);
        alarms.push(Alarm::new("placeholder", Duration::from_secs(60)));

        let mut daily = Alarm::new("daily", Duration::from_secs(60));
        daily.set_daily(TimeOfDay::hm(7, 0).unwrap(), at(6, 0));
        alarms.push(daily);

        let mut arbiter = FiringArbitrator::new();
        let result = arbiter.scan(at(8, 0), &mut alarms);
        assert!(result.is_empty());
    }

    #[test]
    fn removed_primary_closes_or_promotes() {
        let mut alarms = AlarmCollection::new();
        let a = one_time("A", at(7, 0));
        let a_id = a.id().clone();
        alarms.push(a);

        let mut arbiter = FiringArbitrator::new();
        arbiter.scan(at(7, 0), &mut alarms);
        alarms.remove(&a_id);

        let result = arbiter.scan(at(7, 1), &mut alarms);
        assert!(result.promoted.is_none());
        assert!(!arbiter.is_primary_open());
        assert!(arbiter.primary().is_none());
    }

    #[test]
    fn restore_reopens_notification() {
        let mut alarms = AlarmCollection::new();
        let a = one_time("A", at(7, 0));
        let b = one_time("B", at(7, 0));
        let (a_id, b_id) = (a.id().clone(), b.id().clone());
        alarms.push(a);
        alarms.push(b);
        FiringArbitrator::new().scan(at(7, 0), &mut alarms);

        let mut restored = AlarmCollection::from_records(alarms.records());
        let arbiter = FiringArbitrator::restore(&mut restored);
        assert!(arbiter.is_primary_open());
        assert_eq!(arbiter.primary(), Some(&a_id));

        // Only the secondary survives: the next scan promotes it
        restored.remove(&a_id);
        let mut arbiter = FiringArbitrator::restore(&mut restored);
        assert!(arbiter.is_primary_open());
        assert!(arbiter.primary().is_none());

        let result = arbiter.scan(at(7, 5), &mut restored);
        assert_eq!(result.promoted, Some(b_id));
    }
}
