// 📒 Ledger operations
//
// Record creation, lifecycle updates, listings and audit lookups. Every
// function runs inside a caller-supplied `TxContext`; wrap it in `invoke`
// to commit.

use crate::dates::{is_calendar_date, parse_ymd, Window, Ymd, STILL_ACTIVE};
use crate::entities::{
    Asset, AssetKind, BillingRecord, Car, Component, Fuelcell, LedgerAsset, Supplier, UsageRecord,
};
use crate::error::{LedgerError, Result};
use crate::overlap::{bills_for_supplier, ensure_no_overlap};
use crate::store::{HistoryEntry, StateReader, TxContext, WorldState};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

// ============================================================================
// INPUTS
// ============================================================================

/// A journey as submitted by a caller; the date is still a YYYYMMDD string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageInput {
    pub id: String,
    pub car_id: String,
    pub component_id: String,
    pub odometer_start: u32,
    pub distance: u32,
    pub fuel_used: u32,
    pub efficiency: f32,
    pub date: String,

    #[serde(default)]
    pub note: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillInput {
    pub id: String,
    pub supplier_id: String,
    pub fuelcell_id: String,
    pub start_date: String,
    pub end_date: String,
    pub currency: String,
    pub amount: f32,
}

// ============================================================================
// SHARED CHECKS
// ============================================================================

/// Identities are unique across every kind of record
fn ensure_absent<S: StateReader + ?Sized>(
    tx: &mut TxContext<'_, S>,
    kind: AssetKind,
    id: &str,
) -> Result<()> {
    if id.trim().is_empty() {
        return Err(LedgerError::validation("id", id, "identity must not be empty"));
    }

    if tx.get_state(id)?.is_some() {
        return Err(LedgerError::AlreadyExists {
            kind,
            id: id.to_string(),
        });
    }

    Ok(())
}

fn ensure_calendar_date(field: &'static str, value: Ymd) -> Result<()> {
    if is_calendar_date(value) {
        Ok(())
    } else {
        Err(LedgerError::validation(
            field,
            value.to_string(),
            "not a calendar date",
        ))
    }
}

/// Lifecycle end dates are either the sentinel or a real date on/after the start
fn ensure_lifecycle_end(field: &'static str, start: Ymd, end: Ymd) -> Result<()> {
    if end == STILL_ACTIVE {
        return Ok(());
    }

    ensure_calendar_date(field, end)?;
    if end < start {
        return Err(LedgerError::validation(
            field,
            end.to_string(),
            format!("earlier than the start date {}", start),
        ));
    }

    Ok(())
}

fn ensure_rate(field: &'static str, rate: f32) -> Result<()> {
    if rate.is_finite() && rate >= 0.0 {
        Ok(())
    } else {
        Err(LedgerError::validation(
            field,
            rate.to_string(),
            "rates must be finite and non-negative",
        ))
    }
}

// ============================================================================
// USAGE RECORDS
// ============================================================================

fn insert_usage_record<S: StateReader + ?Sized>(
    tx: &mut TxContext<'_, S>,
    mut record: UsageRecord,
) -> Result<UsageRecord> {
    ensure_absent(tx, AssetKind::UsageRecord, &record.id)?;
    ensure_calendar_date("date", record.occurred_on)?;

    if !(0.0..=1.0).contains(&record.efficiency) {
        return Err(LedgerError::validation(
            "efficiency",
            record.efficiency.to_string(),
            "must lie between 0 and 1",
        ));
    }

    tx.require::<Car>(&record.car_id)?;
    let component = tx.require::<Component>(&record.component_id)?;
    if component.car_id != record.car_id {
        return Err(LedgerError::validation(
            "component_id",
            record.component_id.as_str(),
            format!("fitted to {}, not {}", component.car_id, record.car_id),
        ));
    }

    record.billed = false;
    tx.put(&record)?;

    info!(
        usage_id = %record.id,
        car_id = %record.car_id,
        component_id = %record.component_id,
        occurred_on = record.occurred_on,
        "recorded journey"
    );
    Ok(record)
}

/// Store a new journey, unbilled
pub fn create_usage_record<S: StateReader + ?Sized>(
    tx: &mut TxContext<'_, S>,
    input: UsageInput,
) -> Result<UsageRecord> {
    let occurred_on = parse_ymd("date", &input.date)?;

    insert_usage_record(
        tx,
        UsageRecord {
            id: input.id,
            car_id: input.car_id,
            component_id: input.component_id,
            odometer_start: input.odometer_start,
            distance: input.distance,
            fuel_used: input.fuel_used,
            efficiency: input.efficiency,
            occurred_on,
            billed: false,
            note: input.note,
        },
    )
}

pub fn read_usage_record<S: StateReader + ?Sized>(
    tx: &mut TxContext<'_, S>,
    id: &str,
) -> Result<UsageRecord> {
    tx.require::<UsageRecord>(id)
}

// ============================================================================
// BILLING RECORDS
// ============================================================================

/// Write a bill after checking its identity is free and its references exist
pub fn persist_bill<S: StateReader + ?Sized>(
    tx: &mut TxContext<'_, S>,
    bill: &BillingRecord,
) -> Result<()> {
    ensure_absent(tx, AssetKind::BillingRecord, &bill.id)?;
    tx.require::<Supplier>(&bill.supplier_id)?;
    tx.require::<Fuelcell>(&bill.fuelcell_id)?;

    tx.put(bill)?;
    debug!(bill_id = %bill.id, window = %bill.window(), "bill written");
    Ok(())
}

fn insert_billing_record<S: StateReader + ?Sized>(
    tx: &mut TxContext<'_, S>,
    bill: BillingRecord,
) -> Result<BillingRecord> {
    ensure_absent(tx, AssetKind::BillingRecord, &bill.id)?;
    let window = Window::new(bill.date_from, bill.date_to)?;

    if !bill.amount.is_finite() {
        return Err(LedgerError::validation(
            "amount",
            bill.amount.to_string(),
            "must be a finite number",
        ));
    }

    tx.require::<Supplier>(&bill.supplier_id)?;
    let fuelcell = tx.require::<Fuelcell>(&bill.fuelcell_id)?;
    if fuelcell.supplier_id != bill.supplier_id {
        return Err(LedgerError::validation(
            "fuelcell_id",
            bill.fuelcell_id.as_str(),
            format!(
                "leased from {}, not {}",
                fuelcell.supplier_id, bill.supplier_id
            ),
        ));
    }

    let prior = bills_for_supplier(tx, &bill.supplier_id)?;
    ensure_no_overlap(&bill.id, &bill.supplier_id, &window, &prior)?;

    persist_bill(tx, &bill)?;
    info!(
        bill_id = %bill.id,
        supplier_id = %bill.supplier_id,
        window = %window,
        amount = bill.amount,
        "recorded bill"
    );
    Ok(bill)
}

/// Record a bill issued outside `generate_bill`, e.g. imported from a supplier
pub fn create_billing_record<S: StateReader + ?Sized>(
    tx: &mut TxContext<'_, S>,
    input: BillInput,
) -> Result<BillingRecord> {
    let window = Window::parse(&input.start_date, &input.end_date)?;

    insert_billing_record(
        tx,
        BillingRecord {
            id: input.id,
            supplier_id: input.supplier_id,
            fuelcell_id: input.fuelcell_id,
            date_from: window.start,
            date_to: window.end,
            currency: input.currency,
            amount: input.amount,
        },
    )
}

// ============================================================================
// REFERENCE DATA
// ============================================================================

/// Register any record, checking identity and references.
///
/// Journeys and bills go through the same checks as their create operations;
/// journeys are always stored unbilled.
pub fn register_asset<S: StateReader + ?Sized>(
    tx: &mut TxContext<'_, S>,
    asset: Asset,
) -> Result<()> {
    let kind = asset.kind();

    match asset {
        Asset::UsageRecord(record) => {
            insert_usage_record(tx, record)?;
        }
        Asset::BillingRecord(bill) => {
            insert_billing_record(tx, bill)?;
        }
        Asset::Car(car) => {
            ensure_absent(tx, kind, &car.id)?;
            ensure_calendar_date("manufactured_on", car.manufactured_on)?;
            tx.put(&car)?;
        }
        Asset::Supplier(supplier) => {
            ensure_absent(tx, kind, &supplier.id)?;
            tx.put(&supplier)?;
        }
        Asset::Fuelcell(fuelcell) => {
            ensure_absent(tx, kind, &fuelcell.id)?;
            ensure_calendar_date("received_at", fuelcell.received_at)?;
            ensure_lifecycle_end("returned_at", fuelcell.received_at, fuelcell.returned_at)?;
            ensure_rate("base_rate", fuelcell.base_rate)?;
            ensure_rate("distance_rate", fuelcell.distance_rate)?;
            ensure_rate("energy_rate", fuelcell.energy_rate)?;
            tx.require::<Supplier>(&fuelcell.supplier_id)?;
            tx.put(&fuelcell)?;
        }
        Asset::Component(component) => {
            ensure_absent(tx, kind, &component.id)?;
            ensure_calendar_date("installed_at", component.installed_at)?;
            ensure_lifecycle_end("removed_at", component.installed_at, component.removed_at)?;
            tx.require::<Car>(&component.car_id)?;
            tx.require::<Fuelcell>(&component.fuelcell_id)?;
            tx.put(&component)?;
        }
    }

    Ok(())
}

// ============================================================================
// LIFECYCLE UPDATES
// ============================================================================

/// Close a component's installation. The removal date can only be set once.
pub fn remove_component<S: StateReader + ?Sized>(
    tx: &mut TxContext<'_, S>,
    component_id: &str,
    date: &str,
) -> Result<Component> {
    let removed_at = parse_ymd("removed_at", date)?;
    let mut component = tx.require::<Component>(component_id)?;

    if !component.is_installed() {
        return Err(LedgerError::LifecycleClosed {
            kind: AssetKind::Component,
            id: component.id,
            field: "removed_at",
            date: component.removed_at,
        });
    }
    ensure_lifecycle_end("removed_at", component.installed_at, removed_at)?;

    component.removed_at = removed_at;
    tx.put(&component)?;

    info!(component_id = %component.id, removed_at, "component removed");
    Ok(component)
}

/// Hand a fuelcell back to its supplier. The return date can only be set once.
pub fn return_fuelcell<S: StateReader + ?Sized>(
    tx: &mut TxContext<'_, S>,
    fuelcell_id: &str,
    date: &str,
) -> Result<Fuelcell> {
    let returned_at = parse_ymd("returned_at", date)?;
    let mut fuelcell = tx.require::<Fuelcell>(fuelcell_id)?;

    if !fuelcell.is_in_service() {
        return Err(LedgerError::LifecycleClosed {
            kind: AssetKind::Fuelcell,
            id: fuelcell.id,
            field: "returned_at",
            date: fuelcell.returned_at,
        });
    }
    ensure_lifecycle_end("returned_at", fuelcell.received_at, returned_at)?;

    fuelcell.returned_at = returned_at;
    tx.put(&fuelcell)?;

    info!(fuelcell_id = %fuelcell.id, returned_at, "fuelcell returned");
    Ok(fuelcell)
}

// ============================================================================
// LISTINGS & LOOKUPS
// ============================================================================

/// Every record of one kind, in key order
pub fn list<T: LedgerAsset, S: StateReader + ?Sized>(tx: &mut TxContext<'_, S>) -> Result<Vec<T>> {
    tx.all()
}

pub fn list_kind<S: StateReader + ?Sized>(
    tx: &mut TxContext<'_, S>,
    kind: AssetKind,
) -> Result<Vec<Asset>> {
    tx.query(&kind.selector())?
        .into_iter()
        .map(|(key, raw)| Asset::from_json(&key, &raw))
        .collect()
}

/// Absence is `false`; only store failures are errors
pub fn asset_exists<S: StateReader + ?Sized>(tx: &mut TxContext<'_, S>, id: &str) -> Result<bool> {
    Ok(tx.get_state(id)?.is_some())
}

/// Every committed version of a key, oldest first
pub fn key_history<S: WorldState + ?Sized>(store: &S, id: &str) -> Result<Vec<HistoryEntry>> {
    store.history(id)
}
