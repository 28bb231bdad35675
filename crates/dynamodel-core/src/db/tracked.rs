use crate::value::{Value, Values};
use std::collections::BTreeSet;

///
/// TrackedValues
///
/// Field values of one record plus the set of fields mutated since the last
/// load or save. Tracking starts once the record is known to mirror a stored
/// item; before that every save is a full put.
///

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrackedValues {
    values: Values,
    dirty: BTreeSet<String>,
    tracking: bool,
}

impl TrackedValues {
    /// Values not yet known to the store.
    #[must_use]
    pub fn fresh(values: Values) -> Self {
        Self {
            values,
            dirty: BTreeSet::new(),
            tracking: false,
        }
    }

    /// Values just read from the store.
    #[must_use]
    pub fn loaded(values: Values) -> Self {
        Self {
            values,
            dirty: BTreeSet::new(),
            tracking: true,
        }
    }

    #[must_use]
    pub const fn values(&self) -> &Values {
        &self.values
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    #[must_use]
    pub const fn is_tracking(&self) -> bool {
        self.tracking
    }

    #[must_use]
    pub fn is_dirty(&self, field: &str) -> bool {
        self.dirty.contains(field)
    }

    #[must_use]
    pub fn has_changes(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Dirty field names in sorted order.
    pub fn dirty(&self) -> impl Iterator<Item = &str> {
        self.dirty.iter().map(String::as_str)
    }

    /// Assign a field; assigning Null is the same as `unset`.
    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        let field = field.into();
        if value.is_null() {
            self.unset(field);
            return;
        }

        if self.values.get(&field) != Some(&value) {
            self.values.insert(field.clone(), value);
            self.dirty.insert(field);
        }
    }

    /// Remove a field. Removing an absent field is not a change.
    pub fn unset(&mut self, field: impl Into<String>) {
        let field = field.into();
        if self.values.remove(&field).is_some() {
            self.dirty.insert(field);
        }
    }

    /// Replace every value with its normalized form without marking fields.
    pub(crate) fn normalize(&mut self, values: Values) {
        self.values = values;
    }

    /// Mark fields as written.
    pub fn clear<'a>(&mut self, fields: impl IntoIterator<Item = &'a str>) {
        for field in fields {
            self.dirty.remove(field);
        }
    }

    /// Mark everything written and start tracking.
    pub fn clear_all(&mut self) {
        self.dirty.clear();
        self.tracking = true;
    }

    /// Merge values echoed by the store; merged fields are clean.
    pub fn merge(&mut self, echoed: Values) {
        for (field, value) in echoed {
            self.dirty.remove(&field);
            if value.is_null() {
                self.values.remove(&field);
            } else {
                self.values.insert(field, value);
            }
        }
    }

    #[must_use]
    pub fn into_values(self) -> Values {
        self.values
    }
}
