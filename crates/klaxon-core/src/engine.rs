//! Alarm engine: the single object the daemon drives

use chrono::{DateTime, Local};
use klaxon_api::{API_VERSION, AlarmKind, AlarmState, AlarmView, EngineStateSnapshot, FiringRole};
use klaxon_config::{AlarmPreset, Defaults, MAX_SNOOZE_MINUTES};
use klaxon_store::{AuditEvent, AuditEventType, Store};
use klaxon_util::{AlarmId, KlaxonError, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::{Alarm, AlarmCollection, CoreEvent, FiringArbitrator};

/// Owns the alarm collection, the arbitrator, and the store handle
pub struct AlarmEngine {
    alarms: AlarmCollection,
    arbiter: FiringArbitrator,
    default_snooze: Duration,
    default_label: String,
    store: Arc<dyn Store>,
    /// True when the store has never saved alarms
    needs_seed: bool,
}

impl AlarmEngine {
    /// Create an engine, restoring alarms and the default snooze from `store`.
    ///
    /// Unreadable saved alarms are logged and replaced by an empty list.
    pub fn new(defaults: &Defaults, store: Arc<dyn Store>) -> Self {
        let default_snooze = match store.get_default_snooze() {
            Ok(Some(saved)) if snooze_in_range(saved) => saved,
            Ok(Some(saved)) => {
                warn!(
                    secs = saved.as_secs(),
                    "Ignoring out-of-range saved default snooze"
                );
                defaults.snooze
            }
            Ok(None) => defaults.snooze,
            Err(e) => {
                warn!(error = %e, "Failed to load default snooze, using config value");
                defaults.snooze
            }
        };

        let (mut alarms, needs_seed) = match store.load_alarms() {
            Ok(Some(records)) => (AlarmCollection::from_records(records), false),
            Ok(None) => (AlarmCollection::new(), true),
            Err(e) => {
                warn!(error = %e, "Failed to load saved alarms, starting empty");
                (AlarmCollection::new(), false)
            }
        };

        let arbiter = FiringArbitrator::restore(&mut alarms);

        info!(
            alarm_count = alarms.len(),
            default_snooze_secs = default_snooze.as_secs(),
            "Alarm engine initialized"
        );

        Self {
            alarms,
            arbiter,
            default_snooze,
            default_label: defaults.label.clone(),
            store,
            needs_seed,
        }
    }

    /// Create alarms from config presets, only if the store never held any.
    pub fn seed(&mut self, presets: &[AlarmPreset], now: DateTime<Local>) -> Vec<CoreEvent> {
        if !self.needs_seed || presets.is_empty() {
            return Vec::new();
        }
        self.needs_seed = false;

        for preset in presets {
            let mut alarm = Alarm::new(preset.label.clone(), self.default_snooze);
            alarm.configure(preset.kind.clone(), now);
            alarm.set_enabled(preset.enabled);
            self.alarms.push(alarm);
        }

        info!(count = presets.len(), "Seeded alarms from config");
        self.audit(AuditEventType::AlarmsSeeded {
            count: presets.len(),
        });
        self.persist();

        vec![self.changed()]
    }

    /// Scan for due alarms and arbitrate the primary notification
    pub fn tick(&mut self, now: DateTime<Local>) -> Vec<CoreEvent> {
        let result = self.arbiter.scan(now, &mut self.alarms);
        if result.is_empty() {
            return result.events;
        }

        for event in &result.events {
            match event {
                CoreEvent::AlarmFired { alarm_id, role, .. } => {
                    self.audit(AuditEventType::AlarmFired {
                        alarm_id: alarm_id.clone(),
                        role: *role,
                    });
                }
                CoreEvent::AlarmPromoted { alarm_id, .. } => {
                    self.audit(AuditEventType::AlarmPromoted {
                        alarm_id: alarm_id.clone(),
                    });
                }
                _ => {}
            }
        }

        self.persist();
        result.events
    }

    /// Add an unconfigured, disabled alarm at the end of the list
    pub fn create_alarm(&mut self, label: Option<String>) -> (AlarmId, Vec<CoreEvent>) {
        let label = label
            .filter(|l| !l.trim().is_empty())
            .unwrap_or_else(|| self.default_label.clone());
        let alarm = Alarm::new(label.clone(), self.default_snooze);
        let alarm_id = alarm.id().clone();
        self.alarms.push(alarm);

        info!(alarm_id = %alarm_id, label = %label, "Alarm created");
        self.audit(AuditEventType::AlarmCreated {
            alarm_id: alarm_id.clone(),
            label,
        });

        (alarm_id, vec![self.changed()])
    }

    /// Set or replace an alarm's schedule
    pub fn configure(
        &mut self,
        alarm_id: &AlarmId,
        kind: AlarmKind,
        now: DateTime<Local>,
    ) -> Result<Vec<CoreEvent>> {
        let alarm = self.alarm_mut(alarm_id)?;
        let summary = kind.summary();
        let silenced = alarm.configure(kind, now);
        let fire_at = alarm.default_fire_time().unwrap_or(now);

        self.audit(AuditEventType::AlarmConfigured {
            alarm_id: alarm_id.clone(),
            summary,
            fire_at,
        });
        Ok(self.finish_edit(silenced))
    }

    pub fn rename(&mut self, alarm_id: &AlarmId, label: impl Into<String>) -> Result<Vec<CoreEvent>> {
        let label = label.into();
        if label.trim().is_empty() {
            return Err(KlaxonError::validation("label cannot be empty"));
        }

        let alarm = self.alarm_mut(alarm_id)?;
        alarm.set_label(label.clone());
        debug!(alarm_id = %alarm_id, label = %label, "Alarm renamed");

        self.audit(AuditEventType::AlarmRenamed {
            alarm_id: alarm_id.clone(),
            label,
        });
        Ok(self.finish_edit(None))
    }

    pub fn set_enabled(&mut self, alarm_id: &AlarmId, enabled: bool) -> Result<Vec<CoreEvent>> {
        let alarm = self.alarm_mut(alarm_id)?;
        let silenced = alarm.set_enabled(enabled);
        info!(alarm_id = %alarm_id, enabled, "Alarm enable toggled");

        self.audit(AuditEventType::AlarmEnabledChanged {
            alarm_id: alarm_id.clone(),
            enabled,
        });
        Ok(self.finish_edit(silenced))
    }

    /// Delete an alarm. A firing alarm is silenced; the arbitrator hands the
    /// notification on at the next tick.
    pub fn remove(&mut self, alarm_id: &AlarmId) -> Result<Vec<CoreEvent>> {
        let mut alarm = self
            .alarms
            .remove(alarm_id)
            .ok_or_else(|| KlaxonError::AlarmNotFound(alarm_id.clone()))?;
        let silenced = alarm.silence();

        info!(alarm_id = %alarm_id, label = %alarm.label(), "Alarm removed");
        self.audit(AuditEventType::AlarmRemoved {
            alarm_id: alarm_id.clone(),
        });
        Ok(self.finish_edit(silenced))
    }

    pub fn dismiss(&mut self, alarm_id: &AlarmId, now: DateTime<Local>) -> Result<CoreEvent> {
        let event = self.alarm_mut(alarm_id)?.dismiss(now)?;

        if let CoreEvent::AlarmDismissed { retired, .. } = &event {
            self.audit(AuditEventType::AlarmDismissed {
                alarm_id: alarm_id.clone(),
                retired: *retired,
            });
        }
        self.persist();
        Ok(event)
    }

    pub fn snooze(&mut self, alarm_id: &AlarmId, now: DateTime<Local>) -> Result<CoreEvent> {
        let event = self.alarm_mut(alarm_id)?.snooze(now)?;

        if let CoreEvent::AlarmSnoozed { until, .. } = &event {
            self.audit(AuditEventType::AlarmSnoozed {
                alarm_id: alarm_id.clone(),
                until: *until,
            });
        }
        self.persist();
        Ok(event)
    }

    /// Dismiss whichever alarm owns the primary notification
    pub fn dismiss_primary(&mut self, now: DateTime<Local>) -> Result<CoreEvent> {
        let alarm_id = self.current_primary().ok_or(KlaxonError::NothingFiring)?;
        self.dismiss(&alarm_id, now)
    }

    /// Snooze whichever alarm owns the primary notification
    pub fn snooze_primary(&mut self, now: DateTime<Local>) -> Result<CoreEvent> {
        let alarm_id = self.current_primary().ok_or(KlaxonError::NothingFiring)?;
        self.snooze(&alarm_id, now)
    }

    /// Change the snooze given to alarms created from now on.
    ///
    /// Existing alarms keep the snooze they were created with.
    pub fn set_default_snooze(&mut self, duration: Duration) -> Result<CoreEvent> {
        if !snooze_in_range(duration) {
            return Err(KlaxonError::validation(format!(
                "snooze duration must be between 1 second and {} minutes",
                MAX_SNOOZE_MINUTES
            )));
        }

        self.default_snooze = duration;
        if let Err(e) = self.store.set_default_snooze(duration) {
            warn!(error = %e, "Failed to save default snooze");
        }

        info!(secs = duration.as_secs(), "Default snooze changed");
        self.audit(AuditEventType::DefaultSnoozeChanged {
            seconds: duration.as_secs(),
        });
        Ok(CoreEvent::DefaultSnoozeChanged { duration })
    }

    pub fn default_snooze(&self) -> Duration {
        self.default_snooze
    }

    /// The alarm currently firing as primary, if any
    pub fn current_primary(&self) -> Option<AlarmId> {
        self.arbiter
            .primary()
            .and_then(|id| self.alarms.get(id))
            .filter(|a| a.state() == AlarmState::Firing(FiringRole::Primary))
            .map(|a| a.id().clone())
    }

    pub fn get_alarm(&self, alarm_id: &AlarmId) -> Option<AlarmView> {
        self.alarms.get(alarm_id).map(Alarm::view)
    }

    /// All alarms in creation order
    pub fn list_alarms(&self) -> Vec<AlarmView> {
        self.alarms.iter().map(Alarm::view).collect()
    }

    pub fn get_state(&self) -> EngineStateSnapshot {
        EngineStateSnapshot {
            api_version: API_VERSION,
            alarm_count: self.alarms.len(),
            primary: self.current_primary(),
            primary_notification_open: self.arbiter.is_primary_open(),
            default_snooze: self.default_snooze,
            alarms: self.list_alarms(),
        }
    }

    pub fn alarms(&self) -> &AlarmCollection {
        &self.alarms
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Save configured alarms. Failures are logged, never returned.
    pub fn persist(&self) {
        if let Err(e) = self.store.save_alarms(&self.alarms.records()) {
            warn!(error = %e, "Failed to save alarms");
        }
    }

    fn alarm_mut(&mut self, alarm_id: &AlarmId) -> Result<&mut Alarm> {
        self.alarms
            .get_mut(alarm_id)
            .ok_or_else(|| KlaxonError::AlarmNotFound(alarm_id.clone()))
    }

    fn finish_edit(&mut self, silenced: Option<CoreEvent>) -> Vec<CoreEvent> {
        self.needs_seed = false;
        self.persist();

        let mut events: Vec<CoreEvent> = silenced.into_iter().collect();
        events.push(self.changed());
        events
    }

    fn changed(&self) -> CoreEvent {
        CoreEvent::AlarmsChanged {
            alarm_count: self.alarms.len(),
        }
    }

    fn audit(&self, event: AuditEventType) {
        let _ = self.store.append_audit(AuditEvent::new(event));
    }
}

fn snooze_in_range(duration: Duration) -> bool {
    !duration.is_zero() && duration <= Duration::from_secs(MAX_SNOOZE_MINUTES * 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Weekday};
    use klaxon_store::SqliteStore;
    use klaxon_util::TimeOfDay;

    fn at(d: u32, h: u32, m: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 1, d, h, m, 0).unwrap()
    }

    fn make_engine() -> (AlarmEngine, Arc<dyn Store>) {
        let store: Arc<dyn Store> = Arc::new(SqliteStore::in_memory().unwrap());
        (AlarmEngine::new(&Defaults::default(), store.clone()), store)
    }

    fn daily(engine: &mut AlarmEngine, h: u8, m: u8, now: DateTime<Local>) -> AlarmId {
        let (id, _) = engine.create_alarm(None);
        engine
            .configure(
                &id,
                AlarmKind::Daily {
                    time: TimeOfDay::hm(h, m).unwrap(),
                },
                now,
            )
            .unwrap();
        engine.set_enabled(&id, true).unwrap();
        id
    }

    #[test]
    fn created_alarm_uses_defaults() {
        let (mut engine, _) = make_engine();
        let (id, events) = engine.create_alarm(None);

        assert_eq!(events, vec![CoreEvent::AlarmsChanged { alarm_count: 1 }]);
        let view = engine.get_alarm(&id).unwrap();
        assert_eq!(view.label, "An alarm");
        assert_eq!(view.summary, "Not set");
        assert!(!view.enabled);
        assert_eq!(view.snooze_duration, Duration::from_secs(300));
    }

    #[test]
    fn unknown_alarm_is_not_found() {
        let (mut engine, _) = make_engine();
        let missing = AlarmId::new();

        assert!(matches!(
            engine.set_enabled(&missing, true),
            Err(KlaxonError::AlarmNotFound(_))
        ));
        assert!(matches!(
            engine.remove(&missing),
            Err(KlaxonError::AlarmNotFound(_))
        ));
    }

    #[test]
    fn tick_fires_and_dismiss_primary_rearms() {
        let (mut engine, _) = make_engine();
        let id = daily(&mut engine, 7, 0, at(15, 6, 0));

        assert!(engine.tick(at(15, 6, 59)).is_empty());

        let events = engine.tick(at(15, 7, 0));
        assert_eq!(events.len(), 1);
        assert_eq!(engine.current_primary(), Some(id.clone()));

        let event = engine.dismiss_primary(at(15, 7, 2)).unwrap();
        assert_eq!(
            event,
            CoreEvent::AlarmDismissed {
                alarm_id: id.clone(),
                next_fire_time: Some(at(16, 7, 0)),
                retired: false,
            }
        );
        assert!(engine.current_primary().is_none());
    }

    #[test]
    fn primary_actions_need_a_firing_alarm() {
        let (mut engine, _) = make_engine();
        daily(&mut engine, 7, 0, at(15, 6, 0));

        assert!(matches!(
            engine.dismiss_primary(at(15, 6, 30)),
            Err(KlaxonError::NothingFiring)
        ));
        assert!(matches!(
            engine.snooze_primary(at(15, 6, 30)),
            Err(KlaxonError::NothingFiring)
        ));
    }

    #[test]
    fn default_snooze_change_is_not_retroactive() {
        let (mut engine, store) = make_engine();
        let (old, _) = engine.create_alarm(None);

        engine
            .set_default_snooze(Duration::from_secs(10 * 60))
            .unwrap();
        let (new, _) = engine.create_alarm(Some("New".into()));

        assert_eq!(
            engine.get_alarm(&old).unwrap().snooze_duration,
            Duration::from_secs(300)
        );
        assert_eq!(
            engine.get_alarm(&new).unwrap().snooze_duration,
            Duration::from_secs(600)
        );
        assert_eq!(
            store.get_default_snooze().unwrap(),
            Some(Duration::from_secs(600))
        );
        assert!(engine.set_default_snooze(Duration::ZERO).is_err());
    }

    #[test]
    fn default_snooze_is_capped_at_one_day() {
        let (mut engine, store) = make_engine();

        engine
            .set_default_snooze(Duration::from_secs(MAX_SNOOZE_MINUTES * 60))
            .unwrap();
        let err = engine
            .set_default_snooze(Duration::from_secs(100_000_000_000_000))
            .unwrap_err();
        assert!(matches!(err, KlaxonError::ValidationError(_)));
        assert_eq!(
            store.get_default_snooze().unwrap(),
            Some(Duration::from_secs(MAX_SNOOZE_MINUTES * 60))
        );

        // An oversized default can no longer reach a new alarm's snooze
        let (id, _) = engine.create_alarm(None);
        engine
            .configure(&id, AlarmKind::OneTime { fire_at: at(15, 7, 0) }, at(15, 6, 0))
            .unwrap();
        engine.set_enabled(&id, true).unwrap();
        engine.tick(at(15, 7, 0));

        let event = engine.snooze_primary(at(15, 7, 0)).unwrap();
        assert!(matches!(
            event,
            CoreEvent::AlarmSnoozed { until, .. } if until == at(16, 7, 0)
        ));
    }

    #[test]
    fn oversized_saved_snooze_is_ignored_on_restart() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("klaxond.db");

        let store = SqliteStore::open(&db_path).unwrap();
        store
            .set_default_snooze(Duration::from_secs(100_000_000_000_000))
            .unwrap();
        drop(store);

        let store: Arc<dyn Store> = Arc::new(SqliteStore::open(&db_path).unwrap());
        let engine = AlarmEngine::new(&Defaults::default(), store);
        assert_eq!(engine.default_snooze(), Duration::from_secs(300));
    }

    #[test]
    fn rename_rejects_empty_label() {
        let (mut engine, _) = make_engine();
        let (id, _) = engine.create_alarm(None);

        assert!(engine.rename(&id, "   ").is_err());
        engine.rename(&id, "Gym").unwrap();
        assert_eq!(engine.get_alarm(&id).unwrap().label, "Gym");
    }

    #[test]
    fn removing_firing_alarm_silences_it() {
        let (mut engine, _) = make_engine();
        let id = daily(&mut engine, 7, 0, at(15, 6, 0));
        engine.tick(at(15, 7, 0));

        let events = engine.remove(&id).unwrap();
        assert_eq!(
            events,
            vec![
                CoreEvent::AlarmSilenced {
                    alarm_id: id.clone()
                },
                CoreEvent::AlarmsChanged { alarm_count: 0 },
            ]
        );
        assert!(engine.current_primary().is_none());
        assert!(engine.tick(at(15, 7, 1)).is_empty());
        assert!(!engine.get_state().primary_notification_open);
    }

    #[test]
    fn seed_only_into_never_saved_store() {
        let presets = vec![AlarmPreset {
            label: "Weekly".into(),
            enabled: true,
            kind: AlarmKind::Weekly {
                day: Weekday::Mon,
                time: TimeOfDay::hm(8, 0).unwrap(),
            },
        }];

        let (mut engine, store) = make_engine();
        let events = engine.seed(&presets, at(15, 10, 0));
        assert_eq!(events.len(), 1);

        let view = &engine.list_alarms()[0];
        assert_eq!(view.default_fire_time, Some(at(20, 8, 0)));
        assert!(view.enabled);

        // Second engine on the same store sees saved alarms and skips seeding
        let mut engine = AlarmEngine::new(&Defaults::default(), store);
        assert!(engine.seed(&presets, at(15, 10, 0)).is_empty());
        assert_eq!(engine.list_alarms().len(), 1);
    }

    #[test]
    fn state_survives_restart() {
        let (mut engine, store) = make_engine();
        let id = daily(&mut engine, 7, 0, at(15, 6, 0));
        engine.create_alarm(Some("placeholder".into()));
        engine.tick(at(15, 7, 0));

        let engine = AlarmEngine::new(&Defaults::default(), store);
        let state = engine.get_state();
        assert_eq!(state.alarm_count, 1);
        assert_eq!(state.primary, Some(id));
        assert!(state.primary_notification_open);
    }
}
