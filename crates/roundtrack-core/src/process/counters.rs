//! Live counter tally for one round.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{DerivedField, Field, ProcessType};
use crate::error::ValidationError;

/// Non-negative counters for every editable field of one process.
///
/// Derived fields are never stored; they are recomputed from their sources
/// on every read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "CounterSnapshot", try_from = "CounterSnapshot")]
pub struct CounterSet {
    process: ProcessType,
    values: Vec<u32>,
}

/// Wire/storage shape of a [`CounterSet`]: field id to value, derived
/// fields included for readers. Derived ids are ignored when loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterSnapshot {
    pub process: ProcessType,
    pub fields: BTreeMap<String, u32>,
}

impl CounterSet {
    /// All-zero counters for `process`.
    pub fn new(process: ProcessType) -> Self {
        Self {
            process,
            values: vec![0; process.fields().len()],
        }
    }

    pub fn process(&self) -> ProcessType {
        self.process
    }

    /// Current value of `field`. Fields of another process read as 0.
    pub fn get(&self, field: Field) -> u32 {
        if field.process() != self.process {
            return 0;
        }
        self.values[field.index()]
    }

    pub fn derived(&self, field: DerivedField) -> u32 {
        if field.process() != self.process {
            return 0;
        }
        field
            .sources()
            .iter()
            .fold(0u32, |acc, f| acc.saturating_add(self.get(*f)))
    }

    /// Value by wire id, covering editable and derived fields.
    pub fn get_by_id(&self, id: &str) -> Option<u32> {
        if let Some(field) = self.process.fields().iter().find(|f| f.id() == id) {
            return Some(self.get(*field));
        }
        self.process
            .derived_fields()
            .iter()
            .find(|d| d.id() == id)
            .map(|d| self.derived(*d))
    }

    pub fn done(&self) -> u32 {
        self.get(self.process.done_field())
    }

    pub fn cancelled(&self) -> u32 {
        self.get(self.process.cancelled_field())
    }

    /// Add `delta` to `field`, saturating at `u32::MAX`.
    ///
    /// # Errors
    /// Rejects a zero delta or a field from another process. Nothing is
    /// mutated on error.
    pub fn increment(&mut self, field: Field, delta: u32) -> Result<u32, ValidationError> {
        let idx = self.slot(field, delta)?;
        self.values[idx] = self.values[idx].saturating_add(delta);
        Ok(self.values[idx])
    }

    /// Subtract `delta` from `field`, clamping at zero.
    ///
    /// # Errors
    /// Same as [`CounterSet::increment`].
    pub fn decrement(&mut self, field: Field, delta: u32) -> Result<u32, ValidationError> {
        let idx = self.slot(field, delta)?;
        self.values[idx] = self.values[idx].saturating_sub(delta);
        Ok(self.values[idx])
    }

    pub fn reset(&mut self) {
        self.values.iter_mut().for_each(|v| *v = 0);
    }

    pub fn is_all_zero(&self) -> bool {
        self.values.iter().all(|v| *v == 0)
    }

    /// Editable fields with their values, in display order.
    pub fn iter(&self) -> impl Iterator<Item = (Field, u32)> + '_ {
        self.process
            .fields()
            .iter()
            .map(move |f| (*f, self.values[f.index()]))
    }

    /// Every field, derived ones included, keyed by wire id.
    pub fn to_map(&self) -> BTreeMap<String, u32> {
        let mut map: BTreeMap<String, u32> = self
            .iter()
            .map(|(f, v)| (f.id().to_string(), v))
            .collect();
        for derived in self.process.derived_fields() {
            map.insert(derived.id().to_string(), self.derived(*derived));
        }
        map
    }

    fn slot(&self, field: Field, delta: u32) -> Result<usize, ValidationError> {
        if delta == 0 {
            return Err(ValidationError::ZeroDelta);
        }
        if field.process() != self.process {
            return Err(ValidationError::FieldProcessMismatch {
                process: self.process.as_str().to_string(),
                field: field.id().to_string(),
            });
        }
        Ok(field.index())
    }
}

impl From<CounterSet> for CounterSnapshot {
    fn from(set: CounterSet) -> Self {
        Self {
            process: set.process,
            fields: set.to_map(),
        }
    }
}

impl TryFrom<CounterSnapshot> for CounterSet {
    type Error = ValidationError;

    fn try_from(snapshot: CounterSnapshot) -> Result<Self, Self::Error> {
        let mut set = CounterSet::new(snapshot.process);
        for (id, value) in snapshot.fields {
            match snapshot.process.parse_field(&id) {
                Ok(field) => set.values[field.index()] = value,
                Err(ValidationError::DerivedField(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{GuideField, NoveltyField};
    use proptest::prelude::*;

    const DONE: Field = Field::Guide(GuideField::Done);

    #[test]
    fn decrement_clamps_at_zero() {
        let mut set = CounterSet::new(ProcessType::Guides);
        set.increment(DONE, 2).unwrap();
        assert_eq!(set.decrement(DONE, 5).unwrap(), 0);
        assert_eq!(set.decrement(DONE, 1).unwrap(), 0);
    }

    #[test]
    fn zero_delta_and_foreign_field_are_rejected() {
        let mut set = CounterSet::new(ProcessType::Guides);
        assert_eq!(set.increment(DONE, 0), Err(ValidationError::ZeroDelta));
        assert!(matches!(
            set.increment(Field::Novelty(NoveltyField::Called), 1),
            Err(ValidationError::FieldProcessMismatch { .. })
        ));
        assert!(set.is_all_zero());
    }

    #[test]
    fn derived_field_sums_its_sources() {
        let mut set = CounterSet::new(ProcessType::Novelties);
        set.increment(Field::Novelty(NoveltyField::Called), 3).unwrap();
        set.increment(Field::Novelty(NoveltyField::Messaged), 2).unwrap();
        set.increment(Field::Novelty(NoveltyField::Emailed), 1).unwrap();
        set.increment(Field::Novelty(NoveltyField::NoContact), 7).unwrap();

        assert_eq!(set.derived(DerivedField::NoveltyContacts), 6);
        assert_eq!(set.get_by_id("total_contactos"), Some(6));
    }

    #[test]
    fn serialized_form_ignores_derived_values_on_load() {
        let mut set = CounterSet::new(ProcessType::Novelties);
        set.increment(Field::Novelty(NoveltyField::Called), 4).unwrap();

        let mut json = serde_json::to_value(&set).unwrap();
        assert_eq!(json["fields"]["total_contactos"], 4);
        json["fields"]["total_contactos"] = 99.into();

        let loaded: CounterSet = serde_json::from_value(json).unwrap();
        assert_eq!(loaded, set);
    }

    #[test]
    fn unknown_field_in_snapshot_fails_to_load() {
        let json = serde_json::json!({
            "process": "guides",
            "fields": { "realizado": 1, "bogus": 2 }
        });
        assert!(serde_json::from_value::<CounterSet>(json).is_err());
    }

    proptest! {
        #[test]
        fn values_never_go_negative(ops in prop::collection::vec((any::<bool>(), 1u32..20), 0..64)) {
            let mut set = CounterSet::new(ProcessType::Guides);
            let mut model: i64 = 0;
            for (up, delta) in ops {
                if up {
                    set.increment(DONE, delta).unwrap();
                    model += delta as i64;
                } else {
                    set.decrement(DONE, delta).unwrap();
                    model = (model - delta as i64).max(0);
                }
                prop_assert_eq!(set.get(DONE) as i64, model);
            }
        }
    }
}
