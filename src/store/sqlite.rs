// 🗄️ SQLite world state
//
// One row per key in `world_state`, one row per committed version in
// `state_history`. Commits run inside an IMMEDIATE transaction so the read
// set is validated and the write set applied under the same write lock.

use super::{
    asset_type_of, validate_reads, value_hash, CommitReceipt, HistoryEntry, RwSet, Selector,
    StateEntry, StateReader, WorldState,
};
use crate::error::{LedgerError, Result};
use chrono::{DateTime, Utc};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, TransactionBehavior};
use serde_json::Value;
use std::path::Path;

pub struct SqliteWorldState {
    conn: Connection,
}

impl SqliteWorldState {
    /// Open (or create) a file-backed world state in WAL mode
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        // Enable WAL mode for crash recovery
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
        setup_schema(&conn)?;
        Ok(SqliteWorldState { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        setup_schema(&conn)?;
        Ok(SqliteWorldState { conn })
    }

    pub fn count(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM world_state", [], |row| row.get(0))?;
        Ok(count)
    }
}

pub fn setup_schema(conn: &Connection) -> Result<()> {
    // ==========================================================================
    // Current state (one row per key)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS world_state (
            state_key TEXT PRIMARY KEY,
            asset_type TEXT,
            value TEXT NOT NULL,
            version INTEGER NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // History (append-only, one row per committed version)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS state_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            state_key TEXT NOT NULL,
            version INTEGER NOT NULL,
            tx_id TEXT NOT NULL,
            value TEXT NOT NULL,
            value_hash TEXT NOT NULL,
            committed_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_state_asset_type ON world_state(asset_type)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_history_key ON state_history(state_key, version)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// READS (shared by the adapter and by commit-time validation)
// ============================================================================

/// Reader over a borrowed connection, so validation can run inside the
/// commit transaction
struct ConnReader<'c>(&'c Connection);

impl StateReader for ConnReader<'_> {
    fn get_state(&self, key: &str) -> Result<Option<StateEntry>> {
        let entry = self
            .0
            .query_row(
                "SELECT state_key, value, version FROM world_state WHERE state_key = ?1",
                [key],
                row_to_entry,
            )
            .optional()?;
        Ok(entry)
    }

    fn query(&self, selector: &Selector) -> Result<Vec<StateEntry>> {
        let mut sql = String::from(
            "SELECT state_key, value, version FROM world_state WHERE asset_type = ?1",
        );
        let mut bindings = vec![SqlValue::Text(selector.asset_type.clone())];

        for (attribute, expected) in &selector.predicates {
            let path = format!("$.{}", attribute);
            bindings.push(SqlValue::Text(path));
            let path_param = bindings.len();

            match json_to_sql(expected) {
                Some(value) => {
                    bindings.push(value);
                    sql.push_str(&format!(
                        " AND json_extract(value, ?{}) = ?{}",
                        path_param,
                        bindings.len()
                    ));
                }
                None => {
                    sql.push_str(&format!(" AND json_extract(value, ?{}) IS NULL", path_param));
                }
            }
        }
        sql.push_str(" ORDER BY state_key");

        let mut stmt = self.0.prepare(&sql)?;
        let entries = stmt
            .query_map(params_from_iter(bindings.iter()), row_to_entry)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        // json_extract flattens JSON types; confirm the exact match in Rust
        Ok(entries
            .into_iter()
            .filter(|entry| selector.matches_json(&entry.value))
            .collect())
    }

    fn scan_range(&self, start: &str, end: &str) -> Result<Vec<StateEntry>> {
        let mut stmt = self.0.prepare(
            "SELECT state_key, value, version FROM world_state
             WHERE state_key >= ?1 AND (?2 = '' OR state_key < ?2)
             ORDER BY state_key",
        )?;
        let entries = stmt
            .query_map(params![start, end], row_to_entry)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<StateEntry> {
    Ok(StateEntry {
        key: row.get(0)?,
        value: row.get(1)?,
        version: row.get(2)?,
    })
}

/// SQL value `json_extract` yields for a JSON scalar; `None` for null
fn json_to_sql(value: &Value) -> Option<SqlValue> {
    match value {
        Value::Null => None,
        Value::Bool(flag) => Some(SqlValue::Integer(i64::from(*flag))),
        Value::Number(number) => Some(match number.as_i64() {
            Some(int) => SqlValue::Integer(int),
            None => SqlValue::Real(number.as_f64().unwrap_or(f64::NAN)),
        }),
        Value::String(text) => Some(SqlValue::Text(text.clone())),
        other => Some(SqlValue::Text(other.to_string())),
    }
}

impl StateReader for SqliteWorldState {
    fn get_state(&self, key: &str) -> Result<Option<StateEntry>> {
        ConnReader(&self.conn).get_state(key)
    }

    fn query(&self, selector: &Selector) -> Result<Vec<StateEntry>> {
        ConnReader(&self.conn).query(selector)
    }

    fn scan_range(&self, start: &str, end: &str) -> Result<Vec<StateEntry>> {
        ConnReader(&self.conn).scan_range(start, end)
    }
}

// ============================================================================
// COMMIT + HISTORY
// ============================================================================

impl WorldState for SqliteWorldState {
    fn commit(&mut self, rw_set: &RwSet) -> Result<CommitReceipt> {
        let txn = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        // Dropping `txn` on an early return rolls everything back
        validate_reads(&ConnReader(&txn), &rw_set.reads)?;

        let committed_at = Utc::now();
        let committed_at_str = committed_at.to_rfc3339();

        for (key, value) in &rw_set.writes {
            let current: Option<i64> = txn
                .query_row(
                    "SELECT version FROM world_state WHERE state_key = ?1",
                    [key],
                    |row| row.get(0),
                )
                .optional()?;
            let version = current.map_or(1, |v| v + 1);

            txn.execute(
                "INSERT INTO world_state (state_key, asset_type, value, version, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(state_key) DO UPDATE SET
                    asset_type = excluded.asset_type,
                    value = excluded.value,
                    version = excluded.version,
                    updated_at = excluded.updated_at",
                params![key, asset_type_of(value), value, version, committed_at_str],
            )?;

            txn.execute(
                "INSERT INTO state_history (
                    state_key, version, tx_id, value, value_hash, committed_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    key,
                    version,
                    rw_set.tx_id,
                    value,
                    value_hash(value),
                    committed_at_str,
                ],
            )?;
        }

        txn.commit()?;

        Ok(CommitReceipt {
            tx_id: rw_set.tx_id.clone(),
            keys_written: rw_set.writes.len(),
            committed_at,
        })
    }

    fn history(&self, key: &str) -> Result<Vec<HistoryEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT tx_id, version, value, value_hash, committed_at
             FROM state_history
             WHERE state_key = ?1
             ORDER BY version ASC",
        )?;

        let rows = stmt
            .query_map([key], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(tx_id, version, value, value_hash, committed_at)| {
                let committed_at = DateTime::parse_from_rfc3339(&committed_at)
                    .map_err(|e| LedgerError::Corrupt {
                        key: key.to_string(),
                        reason: format!("bad committed_at {:?}: {}", committed_at, e),
                    })?
                    .with_timezone(&Utc);

                Ok(HistoryEntry {
                    tx_id,
                    version,
                    value,
                    value_hash,
                    committed_at,
                })
            })
            .collect()
    }
}
