// In-memory world state for tests and embedding

use super::{
    asset_type_of, in_range, validate_reads, value_hash, CommitReceipt, HistoryEntry, RwSet,
    Selector, StateEntry, StateReader, WorldState,
};
use crate::error::Result;
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

#[derive(Debug, Clone)]
struct Slot {
    value: String,
    version: i64,
    asset_type: Option<String>,
}

/// Ordered keyspace with a secondary index from asset type to keys
#[derive(Debug, Default)]
pub struct MemoryWorldState {
    states: BTreeMap<String, Slot>,
    by_type: BTreeMap<String, BTreeSet<String>>,
    history: BTreeMap<String, Vec<HistoryEntry>>,
}

impl MemoryWorldState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    fn entry(key: &str, slot: &Slot) -> StateEntry {
        StateEntry {
            key: key.to_string(),
            value: slot.value.clone(),
            version: slot.version,
        }
    }
}

impl StateReader for MemoryWorldState {
    fn get_state(&self, key: &str) -> Result<Option<StateEntry>> {
        Ok(self.states.get(key).map(|slot| Self::entry(key, slot)))
    }

    fn query(&self, selector: &Selector) -> Result<Vec<StateEntry>> {
        let Some(keys) = self.by_type.get(&selector.asset_type) else {
            return Ok(Vec::new());
        };

        Ok(keys
            .iter()
            .filter_map(|key| self.states.get(key).map(|slot| (key, slot)))
            .filter(|(_, slot)| selector.matches_json(&slot.value))
            .map(|(key, slot)| Self::entry(key, slot))
            .collect())
    }

    fn scan_range(&self, start: &str, end: &str) -> Result<Vec<StateEntry>> {
        let range = self
            .states
            .range::<str, _>((Bound::Included(start), Bound::Unbounded));

        Ok(range
            .take_while(|(key, _)| in_range(key, start, end))
            .map(|(key, slot)| Self::entry(key, slot))
            .collect())
    }
}

impl WorldState for MemoryWorldState {
    fn commit(&mut self, rw_set: &RwSet) -> Result<CommitReceipt> {
        validate_reads(&*self, &rw_set.reads)?;

        let committed_at = Utc::now();

        for (key, value) in &rw_set.writes {
            let asset_type = asset_type_of(value);
            let version = self.states.get(key).map_or(1, |slot| slot.version + 1);

            if let Some(previous) = self.states.get(key).and_then(|slot| slot.asset_type.clone()) {
                if let Some(keys) = self.by_type.get_mut(&previous) {
                    keys.remove(key);
                }
            }
            if let Some(tag) = &asset_type {
                self.by_type
                    .entry(tag.clone())
                    .or_default()
                    .insert(key.clone());
            }

            self.states.insert(
                key.clone(),
                Slot {
                    value: value.clone(),
                    version,
                    asset_type,
                },
            );
            self.history.entry(key.clone()).or_default().push(HistoryEntry {
                tx_id: rw_set.tx_id.clone(),
                version,
                value: value.clone(),
                value_hash: value_hash(value),
                committed_at,
            });
        }

        Ok(CommitReceipt {
            tx_id: rw_set.tx_id.clone(),
            keys_written: rw_set.writes.len(),
            committed_at,
        })
    }

    fn history(&self, key: &str) -> Result<Vec<HistoryEntry>> {
        Ok(self.history.get(key).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::invoke;

    fn put(store: &mut MemoryWorldState, key: &str, value: &str) {
        invoke(store, |tx| {
            tx.put_state(key, value.to_string());
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_versions_and_history() {
        let mut store = MemoryWorldState::new();
        put(&mut store, "Journey1", r#"{"asset_type":"Journey","billed":false}"#);
        put(&mut store, "Journey1", r#"{"asset_type":"Journey","billed":true}"#);

        let entry = store.get_state("Journey1").unwrap().unwrap();
        assert_eq!(entry.version, 2);

        let history = store.history("Journey1").unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].version, 1);
        assert_eq!(history[1].version, 2);
        assert_ne!(history[0].tx_id, history[1].tx_id);
        assert_eq!(history[1].value_hash, value_hash(&entry.value));
    }

    #[test]
    fn test_query_uses_type_index() {
        let mut store = MemoryWorldState::new();
        put(&mut store, "Car1", r#"{"asset_type":"Car","id":"Car1"}"#);
        put(&mut store, "Journey1", r#"{"asset_type":"Journey","car_id":"Car1"}"#);
        put(&mut store, "Journey2", r#"{"asset_type":"Journey","car_id":"Car2"}"#);

        let journeys = store
            .query(&Selector::new("Journey").with("car_id", "Car1"))
            .unwrap();
        assert_eq!(journeys.len(), 1);
        assert_eq!(journeys[0].key, "Journey1");

        assert!(store.query(&Selector::new("Bill")).unwrap().is_empty());
    }

    #[test]
    fn test_scan_range() {
        let mut store = MemoryWorldState::new();
        for key in ["A", "B", "C", "D"] {
            put(&mut store, key, r#"{"asset_type":"Car"}"#);
        }

        let keys: Vec<String> = store
            .scan_range("B", "D")
            .unwrap()
            .into_iter()
            .map(|e| e.key)
            .collect();
        assert_eq!(keys, vec!["B", "C"]);

        assert_eq!(store.scan_range("", "").unwrap().len(), 4);
        assert_eq!(store.len(), 4);
    }
}
