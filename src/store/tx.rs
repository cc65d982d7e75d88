// Transaction context - one per ledger invocation
//
// Reads go to the committed world state (or to this invocation's own
// pending writes) and are recorded with the versions they observed. Writes
// are buffered. Nothing reaches the store until `WorldState::commit`
// validates the read set and applies every write at once.

use super::{in_range, CommitReceipt, Selector, StateEntry, StateReader, WorldState};
use crate::error::{LedgerError, Result};
use std::collections::BTreeMap;
use tracing::debug;

// ============================================================================
// READ / WRITE SETS
// ============================================================================

/// What a query or range scan covered
#[derive(Debug, Clone, PartialEq)]
pub enum ReadScope {
    Selector(Selector),
    Range { start: String, end: String },
}

impl ReadScope {
    fn describe(&self) -> String {
        match self {
            ReadScope::Selector(selector) => format!("query on {}", selector.asset_type),
            ReadScope::Range { start, end } => format!("range [{:?}, {:?})", start, end),
        }
    }

    fn run<R: StateReader + ?Sized>(&self, reader: &R) -> Result<Vec<StateEntry>> {
        match self {
            ReadScope::Selector(selector) => reader.query(selector),
            ReadScope::Range { start, end } => reader.scan_range(start, end),
        }
    }
}

/// A query or range scan plus the key versions it returned
#[derive(Debug, Clone, PartialEq)]
pub struct ScopeRead {
    pub scope: ReadScope,
    pub observed: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadSet {
    /// Point reads: `None` means the key was absent
    pub keys: BTreeMap<String, Option<i64>>,
    pub scopes: Vec<ScopeRead>,
}

/// Everything one invocation read and wants to write
#[derive(Debug, Clone, PartialEq)]
pub struct RwSet {
    pub tx_id: String,
    pub reads: ReadSet,
    pub writes: BTreeMap<String, String>,
}

impl RwSet {
    pub fn is_read_only(&self) -> bool {
        self.writes.is_empty()
    }
}

/// Check that nothing the invocation read has changed since.
///
/// Point reads compare versions. Queries and range scans are re-run and must
/// return exactly the same keys at the same versions, so a record appearing
/// inside a scanned scope counts as a conflict too.
pub fn validate_reads<R: StateReader + ?Sized>(reader: &R, reads: &ReadSet) -> Result<()> {
    for (key, observed) in &reads.keys {
        let current = reader.get_state(key)?.map(|entry| entry.version);
        if current != *observed {
            return Err(LedgerError::ReadConflict { key: key.clone() });
        }
    }

    for scope_read in &reads.scopes {
        let current: BTreeMap<String, i64> = scope_read
            .scope
            .run(reader)?
            .into_iter()
            .map(|entry| (entry.key, entry.version))
            .collect();

        if current != scope_read.observed {
            let key = current
                .iter()
                .find(|(key, version)| scope_read.observed.get(*key) != Some(version))
                .map(|(key, _)| key.clone())
                .or_else(|| {
                    scope_read
                        .observed
                        .keys()
                        .find(|key| !current.contains_key(*key))
                        .cloned()
                })
                .unwrap_or_else(|| scope_read.scope.describe());
            return Err(LedgerError::ReadConflict { key });
        }
    }

    Ok(())
}

// ============================================================================
// TX CONTEXT
// ============================================================================

pub struct TxContext<'a, S: ?Sized> {
    store: &'a S,
    tx_id: String,
    reads: ReadSet,
    writes: BTreeMap<String, String>,
}

impl<'a, S: StateReader + ?Sized> TxContext<'a, S> {
    pub fn new(store: &'a S) -> Self {
        TxContext {
            store,
            tx_id: uuid::Uuid::new_v4().to_string(),
            reads: ReadSet::default(),
            writes: BTreeMap::new(),
        }
    }

    pub fn tx_id(&self) -> &str {
        &self.tx_id
    }

    /// Read a key, seeing this invocation's own writes first
    pub fn get_state(&mut self, key: &str) -> Result<Option<String>> {
        if let Some(pending) = self.writes.get(key) {
            return Ok(Some(pending.clone()));
        }

        let entry = self.store.get_state(key)?;
        self.reads
            .keys
            .entry(key.to_string())
            .or_insert_with(|| entry.as_ref().map(|e| e.version));

        Ok(entry.map(|e| e.value))
    }

    /// Buffer a write; later writes to the same key replace earlier ones
    pub fn put_state(&mut self, key: &str, value: String) {
        self.writes.insert(key.to_string(), value);
    }

    /// Equality query, overlaid with pending writes. Returns `(key, value)`
    /// pairs in key order.
    pub fn query(&mut self, selector: &Selector) -> Result<Vec<(String, String)>> {
        let entries = self.store.query(selector)?;
        let mut results = self.record_scope(ReadScope::Selector(selector.clone()), entries);

        for (key, value) in &self.writes {
            if selector.matches_json(value) {
                results.insert(key.clone(), value.clone());
            } else {
                results.remove(key);
            }
        }

        Ok(results.into_iter().collect())
    }

    /// Key-range scan over `[start, end)`, overlaid with pending writes
    pub fn scan_range(&mut self, start: &str, end: &str) -> Result<Vec<(String, String)>> {
        let entries = self.store.scan_range(start, end)?;
        let scope = ReadScope::Range {
            start: start.to_string(),
            end: end.to_string(),
        };
        let mut results = self.record_scope(scope, entries);

        for (key, value) in &self.writes {
            if in_range(key, start, end) {
                results.insert(key.clone(), value.clone());
            }
        }

        Ok(results.into_iter().collect())
    }

    fn record_scope(&mut self, scope: ReadScope, entries: Vec<StateEntry>) -> BTreeMap<String, String> {
        let mut observed = BTreeMap::new();
        let mut results = BTreeMap::new();

        for entry in entries {
            observed.insert(entry.key.clone(), entry.version);
            results.insert(entry.key, entry.value);
        }

        self.reads.scopes.push(ScopeRead { scope, observed });
        results
    }

    pub fn pending_writes(&self) -> usize {
        self.writes.len()
    }

    pub fn into_rw_set(self) -> RwSet {
        RwSet {
            tx_id: self.tx_id,
            reads: self.reads,
            writes: self.writes,
        }
    }
}

/// Run one ledger operation against the store and commit its writes.
///
/// The operation runs against a shared borrow of the store; its read/write
/// set is committed afterwards. A failed operation commits nothing.
pub fn invoke<S, T, F>(store: &mut S, operation: F) -> Result<T>
where
    S: WorldState + ?Sized,
    F: FnOnce(&mut TxContext<'_, S>) -> Result<T>,
{
    let (output, rw_set) = {
        let mut tx = TxContext::new(&*store);
        let output = operation(&mut tx)?;
        (output, tx.into_rw_set())
    };

    if rw_set.is_read_only() {
        return Ok(output);
    }

    let receipt: CommitReceipt = store.commit(&rw_set)?;
    debug!(
        tx_id = %receipt.tx_id,
        keys_written = receipt.keys_written,
        "committed invocation"
    );

    Ok(output)
}
