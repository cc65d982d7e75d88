// Fuelcell Ledger - Core Library
// Billing reconciliation for leased fuelcells over a versioned world state

pub mod billing;
pub mod config;
pub mod cost;
pub mod dates;
pub mod entities;
pub mod error;
pub mod ledger;
pub mod lifecycle;
pub mod logging;
pub mod overlap;
pub mod store;
pub mod usage;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use billing::{generate_bill, BillReport, BillingStage};
pub use config::{LedgerConfig, LoggingConfig, StoreConfig};
pub use cost::{CostBreakdown, CostCalculator, UsageCharge};
pub use dates::{parse_ymd, Window, Ymd, STILL_ACTIVE};
pub use entities::{
    Asset, AssetKind, BillingRecord, Car, Component, Fuelcell, LedgerAsset, Supplier, UsageRecord,
};
pub use error::{ErrorCategory, LedgerError, Result};
pub use ledger::{
    asset_exists, create_billing_record, create_usage_record, key_history, list, list_kind,
    read_usage_record, register_asset, remove_component, return_fuelcell, BillInput, UsageInput,
};
pub use lifecycle::{
    active_components_for, component_active_in, ensure_fuelcell_in_service,
    fuelcells_in_service_for_supplier, InactiveReason,
};
pub use overlap::{bills_for_supplier, ensure_no_overlap, OverlapRule};
pub use store::{
    invoke, HistoryEntry, MemoryWorldState, Selector, SqliteWorldState, StateReader, TxContext,
    WorldState,
};
pub use usage::{usage_between, usage_for_car, usage_for_car_by_scan, usage_in_window};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
