//! Structured log records with case-insensitive field names.

use crate::fields::{fold_case, FieldSet};
use crate::{RELAXED_KEY, VIOLATIONS_KEY};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// An insertion-ordered map from field name to JSON value.
///
/// Keys compare without regard to case. The spelling used by the first
/// insert of a key is kept; later inserts under a different case replace the
/// value only.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(from = "Map<String, Value>")]
pub struct LogRecord {
    entries: Vec<(String, Value)>,
    index: HashMap<String, usize>,
}

impl LogRecord {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty record with room for `capacity` fields.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            index: HashMap::with_capacity(capacity),
        }
    }

    /// Insert or replace a field. Returns the previous value, if any.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let value = value.into();
        if let Some(&slot) = self.index.get(fold_case(&key).as_ref()) {
            return Some(std::mem::replace(&mut self.entries[slot].1, value));
        }
        self.index
            .insert(fold_case(&key).into_owned(), self.entries.len());
        self.entries.push((key, value));
        None
    }

    /// Look up a field ignoring case.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.index
            .get(fold_case(key).as_ref())
            .map(|&slot| &self.entries[slot].1)
    }

    /// Look up a field mutably ignoring case.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        match self.index.get(fold_case(key).as_ref()) {
            Some(&slot) => Some(&mut self.entries[slot].1),
            None => None,
        }
    }

    /// Whether a field is present, ignoring case.
    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(fold_case(key).as_ref())
    }

    /// Remove a field, preserving the order of the rest.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let slot = self.index.remove(fold_case(key).as_ref())?;
        let (_, value) = self.entries.remove(slot);
        for (name, _) in &self.entries[slot..] {
            if let Some(pos) = self.index.get_mut(fold_case(name).as_ref()) {
                *pos -= 1;
            }
        }
        Some(value)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate fields in insertion order with their original spelling.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Remove every field, keeping the allocations.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }

    /// Whether the record carries a true relax flag.
    ///
    /// Accepts a JSON boolean or the string `"true"` (any case).
    pub fn is_relaxed(&self) -> bool {
        self.get(RELAXED_KEY).is_some_and(is_relax_value)
    }

    /// Stamp the relax flag.
    pub fn set_relaxed(&mut self, relaxed: bool) {
        self.insert(RELAXED_KEY, relaxed);
    }

    /// The raw violations value attached by the validator, if any.
    pub fn violations(&self) -> Option<&Value> {
        self.get(VIOLATIONS_KEY)
    }

    /// Replace this record's contents with a copy of `map`.
    ///
    /// When `map` holds several spellings of one key, the first spelling in
    /// map order and its value are kept.
    pub fn copy_from_map(&mut self, map: &Map<String, Value>) {
        self.clear();
        for (key, value) in map {
            if !self.contains_key(key) {
                self.insert(key.as_str(), value.clone());
            }
        }
    }

    /// Write the fields a pass touched back onto `map`.
    ///
    /// A field is touched when it is in `redacted`, when its value differs
    /// from the one `map` holds under the same spelling, or when `map` does
    /// not hold that spelling. Touched values are written to every spelling
    /// of the key in `map`; touched keys absent under any spelling are
    /// appended. Untouched keys are left alone.
    pub fn write_back(&self, map: &mut Map<String, Value>, redacted: &FieldSet) {
        for (key, current) in &self.entries {
            let touched = match map.get(key) {
                Some(seeded) => seeded != current || redacted.contains(key),
                None => true,
            };
            if !touched {
                continue;
            }

            let folded = fold_case(key);
            let mut present = false;
            for (name, value) in map.iter_mut() {
                if fold_case(name) == folded {
                    present = true;
                    if value != current {
                        value.clone_from(current);
                    }
                }
            }
            if !present {
                map.insert(key.clone(), current.clone());
            }
        }
    }

    /// Convert into a JSON object.
    pub fn into_map(self) -> Map<String, Value> {
        self.entries.into_iter().collect()
    }
}

/// Whether a relax-flag value means "relaxed".
pub(crate) fn is_relax_value(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::String(s) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

impl From<Map<String, Value>> for LogRecord {
    fn from(map: Map<String, Value>) -> Self {
        let mut record = LogRecord::with_capacity(map.len());
        for (key, value) in map {
            record.insert(key, value);
        }
        record
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for LogRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = LogRecord::new();
        for (key, value) in iter {
            record.insert(key, value);
        }
        record
    }
}

impl PartialEq for LogRecord {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl Serialize for LogRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}
