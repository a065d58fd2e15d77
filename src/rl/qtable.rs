//! Value table: state key → one value per action

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::fmt;

use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

use super::encoder::StateKey;
use crate::game::{ACTION_COUNT, Direction};

/// Action values of one state, in [`Direction::ALL`] order
pub type QValues = [f64; ACTION_COUNT];

/// Q-table mapping state keys to action values
///
/// Unseen keys read as all zeros. Rows are only created by writes, so reading
/// never grows the table. Keys are kept sorted, which gives persisted files a
/// stable order. A serialized table that names a key twice is rejected
/// rather than resolved in favour of either row.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct QTable {
    values: BTreeMap<StateKey, QValues>,
}

impl QTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Action values for `key`, zeros if the key was never written
    pub fn get(&self, key: &StateKey) -> QValues {
        self.values
            .get(key)
            .copied()
            .unwrap_or([0.0; ACTION_COUNT])
    }

    pub fn value(&self, key: &StateKey, action: Direction) -> f64 {
        self.get(key)[action.index()]
    }

    /// Write one action value, creating the row if needed
    pub fn set(&mut self, key: &StateKey, action: Direction, value: f64) {
        self.values
            .entry(key.clone())
            .or_insert([0.0; ACTION_COUNT])[action.index()] = value;
    }

    /// Largest action value for `key`
    pub fn max_value(&self, key: &StateKey) -> f64 {
        self.get(key).into_iter().fold(f64::NEG_INFINITY, f64::max)
    }

    /// Greedy action for `key`; ties go to the first action in action order
    pub fn best_action(&self, key: &StateKey) -> Direction {
        let row = self.get(key);
        let mut best = 0;
        for (idx, &value) in row.iter().enumerate().skip(1) {
            if value > row[best] {
                best = idx;
            }
        }
        Direction::ALL[best]
    }

    pub fn contains(&self, key: &StateKey) -> bool {
        self.values.contains_key(key)
    }

    /// Number of states with a stored row
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &StateKey> {
        self.values.keys()
    }
}

impl<'de> Deserialize<'de> for QTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TableVisitor;

        impl<'de> Visitor<'de> for TableVisitor {
            type Value = QTable;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "a map from state keys to {ACTION_COUNT} action values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<QTable, A::Error> {
                let mut values = BTreeMap::new();
                while let Some((key, row)) = map.next_entry::<StateKey, QValues>()? {
                    match values.entry(key) {
                        Entry::Occupied(entry) => {
                            return Err(de::Error::custom(format_args!(
                                "duplicate state key `{}`",
                                entry.key()
                            )));
                        }
                        Entry::Vacant(entry) => {
                            entry.insert(row);
                        }
                    }
                }
                Ok(QTable { values })
            }
        }

        deserializer.deserialize_map(TableVisitor)
    }
}
