//! Ordered set of alarms

use klaxon_api::AlarmState;
use klaxon_store::AlarmRecord;
use klaxon_util::AlarmId;

use crate::Alarm;

/// Alarms in insertion order. Order is the arbitration tie-break.
#[derive(Debug, Clone, Default)]
pub struct AlarmCollection {
    alarms: Vec<Alarm>,
}

impl AlarmCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: Vec<AlarmRecord>) -> Self {
        Self {
            alarms: records.into_iter().map(Alarm::from_record).collect(),
        }
    }

    /// Persistable records in collection order; unconfigured alarms are skipped.
    pub fn records(&self) -> Vec<AlarmRecord> {
        self.alarms.iter().filter_map(Alarm::to_record).collect()
    }

    pub fn push(&mut self, alarm: Alarm) {
        self.alarms.push(alarm);
    }

    pub fn remove(&mut self, id: &AlarmId) -> Option<Alarm> {
        let index = self.position(id)?;
        Some(self.alarms.remove(index))
    }

    pub fn get(&self, id: &AlarmId) -> Option<&Alarm> {
        self.alarms.iter().find(|a| a.id() == id)
    }

    pub fn get_mut(&mut self, id: &AlarmId) -> Option<&mut Alarm> {
        self.alarms.iter_mut().find(|a| a.id() == id)
    }

    pub fn position(&self, id: &AlarmId) -> Option<usize> {
        self.alarms.iter().position(|a| a.id() == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Alarm> {
        self.alarms.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Alarm> {
        self.alarms.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.alarms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alarms.is_empty()
    }

    /// Ids of alarms in `state`, in collection order
    pub fn ids_in_state(&self, state: AlarmState) -> Vec<AlarmId> {
        self.alarms
            .iter()
            .filter(|a| a.state() == state)
            .map(|a| a.id().clone())
            .collect()
    }
}
