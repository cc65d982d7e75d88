// World state adapters
//
// The billing engine never talks to a database directly. It reads through
// `StateReader` and hands a finished read/write set to `WorldState::commit`,
// which applies it atomically or rejects it when anything it read has moved.

pub mod memory;
pub mod sqlite;
pub mod tx;

pub use memory::MemoryWorldState;
pub use sqlite::SqliteWorldState;
pub use tx::{invoke, validate_reads, ReadScope, ReadSet, RwSet, ScopeRead, TxContext};

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Attribute every stored record carries to name its kind
pub const ASSET_TYPE_ATTR: &str = "asset_type";

/// One committed key with its current version
#[derive(Debug, Clone, PartialEq)]
pub struct StateEntry {
    pub key: String,
    pub value: String,
    pub version: i64,
}

/// One committed version of a key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub tx_id: String,
    pub version: i64,
    pub value: String,
    pub value_hash: String,
    pub committed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommitReceipt {
    pub tx_id: String,
    pub keys_written: usize,
    pub committed_at: DateTime<Utc>,
}

// ============================================================================
// SELECTOR
// ============================================================================

/// Equality query: one asset type plus attribute equalities
#[derive(Debug, Clone, PartialEq)]
pub struct Selector {
    pub asset_type: String,
    pub predicates: Vec<(String, Value)>,
}

impl Selector {
    pub fn new(asset_type: impl Into<String>) -> Self {
        Selector {
            asset_type: asset_type.into(),
            predicates: Vec::new(),
        }
    }

    pub fn with(mut self, attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        self.predicates.push((attribute.into(), value.into()));
        self
    }

    /// Check a decoded record against the selector
    pub fn matches(&self, record: &Value) -> bool {
        if record.get(ASSET_TYPE_ATTR).and_then(Value::as_str) != Some(self.asset_type.as_str()) {
            return false;
        }

        self.predicates
            .iter()
            .all(|(attribute, expected)| record.get(attribute) == Some(expected))
    }

    /// Check a raw JSON value; undecodable values never match
    pub fn matches_json(&self, raw: &str) -> bool {
        serde_json::from_str::<Value>(raw)
            .map(|record| self.matches(&record))
            .unwrap_or(false)
    }
}

/// Key range `[start, end)`; an empty bound is open
pub fn in_range(key: &str, start: &str, end: &str) -> bool {
    key >= start && (end.is_empty() || key < end)
}

/// Read the asset type tag out of a stored value, if it has one
pub fn asset_type_of(raw: &str) -> Option<String> {
    serde_json::from_str::<Value>(raw)
        .ok()?
        .get(ASSET_TYPE_ATTR)?
        .as_str()
        .map(str::to_string)
}

pub fn value_hash(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    format!("{:x}", hasher.finalize())
}

// ============================================================================
// ADAPTER TRAITS
// ============================================================================

/// Read side of the world state
pub trait StateReader {
    fn get_state(&self, key: &str) -> Result<Option<StateEntry>>;

    /// Records matching the selector, in key order
    fn query(&self, selector: &Selector) -> Result<Vec<StateEntry>>;

    /// Records with keys in `[start, end)`, in key order
    fn scan_range(&self, start: &str, end: &str) -> Result<Vec<StateEntry>>;
}

/// Full world state: reads plus atomic commit and per-key history
pub trait WorldState: StateReader {
    /// Validate the read set and apply the write set as one unit
    fn commit(&mut self, rw_set: &RwSet) -> Result<CommitReceipt>;

    /// Every committed version of a key, oldest first
    fn history(&self, key: &str) -> Result<Vec<HistoryEntry>>;
}

impl<T: StateReader + ?Sized> StateReader for Box<T> {
    fn get_state(&self, key: &str) -> Result<Option<StateEntry>> {
        (**self).get_state(key)
    }

    fn query(&self, selector: &Selector) -> Result<Vec<StateEntry>> {
        (**self).query(selector)
    }

    fn scan_range(&self, start: &str, end: &str) -> Result<Vec<StateEntry>> {
        (**self).scan_range(start, end)
    }
}

impl<T: WorldState + ?Sized> WorldState for Box<T> {
    fn commit(&mut self, rw_set: &RwSet) -> Result<CommitReceipt> {
        (**self).commit(rw_set)
    }

    fn history(&self, key: &str) -> Result<Vec<HistoryEntry>> {
        (**self).history(key)
    }
}
