// Ledger errors - one enum for the whole library
//
// Every variant maps onto one of five categories so callers can branch on
// the kind of failure without matching individual variants.

use crate::dates::Window;
use crate::entities::AssetKind;
use crate::lifecycle::InactiveReason;
use crate::overlap::OverlapRule;
use thiserror::Error;

/// Coarse failure taxonomy exposed to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    NotFound,
    Conflict,
    Validation,
    NotActiveInWindow,
    Internal,
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("{kind} {id} does not exist")]
    NotFound { kind: AssetKind, id: String },

    #[error("{kind} {id} already exists")]
    AlreadyExists { kind: AssetKind, id: String },

    #[error(
        "bill {bill_id} {candidate} for supplier {supplier_id} {rule} of bill {existing_bill} {existing}"
    )]
    OverlappingWindow {
        bill_id: String,
        supplier_id: String,
        candidate: Window,
        existing_bill: String,
        existing: Window,
        rule: OverlapRule,
    },

    #[error("{kind} {id} already has {field} set to {date}")]
    LifecycleClosed {
        kind: AssetKind,
        id: String,
        field: &'static str,
        date: u32,
    },

    #[error("read conflict on {key}: world state changed since it was read")]
    ReadConflict { key: String },

    #[error("invalid {field} {value:?}: {reason}")]
    Validation {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("fuelcell {fuelcell_id} was not in service during {window}: {reason}")]
    NotActiveInWindow {
        fuelcell_id: String,
        window: Window,
        reason: InactiveReason,
    },

    #[error("world state failure: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("record {key} could not be encoded or decoded: {source}")]
    Serialization {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("corrupt record {key}: {reason}")]
    Corrupt { key: String, reason: String },
}

impl LedgerError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            LedgerError::NotFound { .. } => ErrorCategory::NotFound,
            LedgerError::AlreadyExists { .. }
            | LedgerError::OverlappingWindow { .. }
            | LedgerError::LifecycleClosed { .. }
            | LedgerError::ReadConflict { .. } => ErrorCategory::Conflict,
            LedgerError::Validation { .. } => ErrorCategory::Validation,
            LedgerError::NotActiveInWindow { .. } => ErrorCategory::NotActiveInWindow,
            LedgerError::Storage(_)
            | LedgerError::Serialization { .. }
            | LedgerError::Corrupt { .. } => ErrorCategory::Internal,
        }
    }

    pub fn is_conflict(&self) -> bool {
        self.category() == ErrorCategory::Conflict
    }

    /// Read conflicts are the only failures worth retrying unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::ReadConflict { .. })
    }

    pub(crate) fn validation(
        field: &'static str,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        LedgerError::Validation {
            field,
            value: value.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
