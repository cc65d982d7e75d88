// 🧾 Billing commit
//
// Generates one bill for a fuelcell over a window and marks every journey it
// priced as billed. Stages:
//
//   Validating -> Costing -> Persisted -> Marking -> Complete
//                      (any stage) -> Failed
//
// The bill and the billed flags are buffered in the same write set, so a
// committed bill never coexists with unmarked journeys it charged for. If any
// stage fails the invocation commits nothing.

use crate::cost::{CostBreakdown, CostCalculator};
use crate::dates::Window;
use crate::entities::{BillingRecord, Fuelcell, UsageRecord};
use crate::error::{LedgerError, Result};
use crate::ledger::persist_bill;
use crate::lifecycle::{active_components_for, ensure_fuelcell_in_service};
use crate::overlap::{bills_for_supplier, ensure_no_overlap};
use crate::store::{StateReader, TxContext};
use crate::usage::usage_in_window;
use serde::Serialize;
use std::fmt;
use tracing::{debug, info, warn};

// ============================================================================
// STAGES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BillingStage {
    Validating,
    Costing,
    Persisted,
    Marking,
    Complete,
    Failed,
}

impl fmt::Display for BillingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BillingStage::Validating => "validating",
            BillingStage::Costing => "costing",
            BillingStage::Persisted => "persisted",
            BillingStage::Marking => "marking",
            BillingStage::Complete => "complete",
            BillingStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Stage tracker for one bill
struct BillingRun {
    bill_id: String,
    stages: Vec<BillingStage>,
}

impl BillingRun {
    fn new(bill_id: &str) -> Self {
        BillingRun {
            bill_id: bill_id.to_string(),
            stages: vec![BillingStage::Validating],
        }
    }

    fn current(&self) -> BillingStage {
        self.stages
            .last()
            .copied()
            .unwrap_or(BillingStage::Validating)
    }

    fn advance(&mut self, next: BillingStage) {
        debug!(bill_id = %self.bill_id, from = %self.current(), to = %next, "billing stage");
        self.stages.push(next);
    }

    fn fail(&mut self, err: &LedgerError) {
        warn!(
            bill_id = %self.bill_id,
            stage = %self.current(),
            category = ?err.category(),
            "billing failed: {}",
            err
        );
        self.stages.push(BillingStage::Failed);
    }
}

// ============================================================================
// REPORT
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct BillReport {
    pub bill: BillingRecord,
    pub breakdown: CostBreakdown,

    /// Journeys flipped to billed by this run
    pub marked: Vec<String>,

    pub stages: Vec<BillingStage>,
}

impl BillReport {
    pub fn summary(&self) -> String {
        let mut summary = String::new();
        summary.push_str(&format!(
            "Bill {} for {} from supplier {} over {}\n",
            self.bill.id, self.bill.fuelcell_id, self.bill.supplier_id, self.breakdown.window
        ));
        summary.push_str(&format!("  Amount:        {} {:.2}\n", self.bill.currency, self.bill.amount));
        summary.push_str(&format!(
            "  Base charge:   {:.2} ({} days)\n",
            self.breakdown.base_charge, self.breakdown.billable_days
        ));
        summary.push_str(&format!(
            "  Usage:         {:.2} ({} journeys)\n",
            self.breakdown.usage_total,
            self.breakdown.charges.len()
        ));
        for charge in &self.breakdown.charges {
            summary.push_str(&format!(
                "    {:<12} {:<12} {:.2}\n",
                charge.usage_id, charge.component_id, charge.cost
            ));
        }
        if !self.breakdown.skipped_billed.is_empty() {
            summary.push_str(&format!(
                "  Already billed: {}\n",
                self.breakdown.skipped_billed.join(", ")
            ));
        }
        summary.push_str(&format!("  Marked billed: {}\n", self.marked.len()));
        summary
    }
}

// ============================================================================
// GENERATE BILL
// ============================================================================

/// Price a fuelcell's usage over `[start_date, end_date]`, write the bill and
/// mark the priced journeys as billed.
pub fn generate_bill<S: StateReader + ?Sized>(
    tx: &mut TxContext<'_, S>,
    bill_id: &str,
    fuelcell_id: &str,
    start_date: &str,
    end_date: &str,
) -> Result<BillReport> {
    let mut run = BillingRun::new(bill_id);

    match run_stages(tx, &mut run, fuelcell_id, start_date, end_date) {
        Ok(report) => {
            info!(
                bill_id = %report.bill.id,
                fuelcell_id = %report.bill.fuelcell_id,
                amount = report.bill.amount,
                marked = report.marked.len(),
                "bill generated"
            );
            Ok(report)
        }
        Err(err) => {
            run.fail(&err);
            Err(err)
        }
    }
}

fn run_stages<S: StateReader + ?Sized>(
    tx: &mut TxContext<'_, S>,
    run: &mut BillingRun,
    fuelcell_id: &str,
    start_date: &str,
    end_date: &str,
) -> Result<BillReport> {
    // Validating
    let window = Window::parse(start_date, end_date)?;
    let fuelcell = tx.require::<Fuelcell>(fuelcell_id)?;

    let prior = bills_for_supplier(tx, &fuelcell.supplier_id)?;
    ensure_no_overlap(&run.bill_id, &fuelcell.supplier_id, &window, &prior)?;
    ensure_fuelcell_in_service(&fuelcell, &window)?;

    // Costing
    run.advance(BillingStage::Costing);
    let in_scope = usage_in_scope(tx, &fuelcell, &window)?;
    let breakdown = CostCalculator::new(&fuelcell, window).price(&in_scope);
    let priced: Vec<String> = breakdown.priced_ids().map(str::to_string).collect();

    // Persisted
    run.advance(BillingStage::Persisted);
    let bill = BillingRecord {
        id: run.bill_id.clone(),
        supplier_id: fuelcell.supplier_id.clone(),
        fuelcell_id: fuelcell.id.clone(),
        date_from: window.start,
        date_to: window.end,
        currency: breakdown.currency.clone(),
        amount: breakdown.total,
    };
    persist_bill(tx, &bill)?;

    // Marking: the set priced above, nothing re-derived
    run.advance(BillingStage::Marking);
    let marked = mark_billed(tx, &priced)?;

    run.advance(BillingStage::Complete);
    Ok(BillReport {
        bill,
        breakdown,
        marked,
        stages: run.stages.clone(),
    })
}

/// Journeys of every component that carried the fuelcell during the window
fn usage_in_scope<S: StateReader + ?Sized>(
    tx: &mut TxContext<'_, S>,
    fuelcell: &Fuelcell,
    window: &Window,
) -> Result<Vec<UsageRecord>> {
    let mut records = Vec::new();

    for component in active_components_for(tx, &fuelcell.id, window)? {
        let found = usage_in_window(tx, &component.id, window)?;
        debug!(
            component_id = %component.id,
            journeys = found.len(),
            "usage in window"
        );
        records.extend(found);
    }

    Ok(records)
}

fn mark_billed<S: StateReader + ?Sized>(
    tx: &mut TxContext<'_, S>,
    usage_ids: &[String],
) -> Result<Vec<String>> {
    let mut marked = Vec::with_capacity(usage_ids.len());

    for usage_id in usage_ids {
        let mut record = tx.require::<UsageRecord>(usage_id)?;
        if record.billed {
            continue;
        }

        record.billed = true;
        tx.put(&record)?;
        marked.push(record.id);
    }

    Ok(marked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;
    use crate::ledger::read_usage_record;
    use crate::store::{invoke, SqliteWorldState, WorldState};
    use crate::testing::{reference_assets, reference_ledger, seed};

    const TOLERANCE: f32 = 1e-3;

    #[test]
    fn test_reference_bill_for_fuelcell1() {
        let mut store = reference_ledger();

        let report = invoke(&mut store, |tx| {
            generate_bill(tx, "Bill1", "FuelCell1", "20200101", "20200131")
        })
        .unwrap();

        assert!((report.breakdown.usage_total - 405.0).abs() < TOLERANCE);
        assert!((report.breakdown.base_charge - 31.0).abs() < TOLERANCE);
        assert!((report.bill.amount - 436.0).abs() < TOLERANCE);
        assert_eq!(report.bill.supplier_id, "Supplier1");
        assert_eq!(report.bill.currency, "GBP");
        assert_eq!(report.marked, vec!["Journey1", "Journey2"]);
        assert_eq!(
            report.stages,
            vec![
                BillingStage::Validating,
                BillingStage::Costing,
                BillingStage::Persisted,
                BillingStage::Marking,
                BillingStage::Complete,
            ]
        );

        let (journey1, journey6, bill) = invoke(&mut store, |tx| {
            Ok((
                read_usage_record(tx, "Journey1")?,
                read_usage_record(tx, "Journey6")?,
                tx.require::<BillingRecord>("Bill1")?,
            ))
        })
        .unwrap();
        assert!(journey1.billed);
        assert!(!journey6.billed);
        assert_eq!(bill, report.bill);

        println!("✅ {}", report.summary());
    }

    #[test]
    fn test_overlapping_bill_is_a_conflict() {
        let mut store = reference_ledger();

        invoke(&mut store, |tx| {
            generate_bill(tx, "Bill1", "FuelCell1", "20210101", "20210131")
        })
        .unwrap();

        let err = invoke(&mut store, |tx| {
            generate_bill(tx, "Bill2", "FuelCell1", "20210115", "20210215")
        })
        .unwrap_err();

        assert_eq!(err.category(), ErrorCategory::Conflict);
        let message = err.to_string();
        assert!(message.contains("[20210115, 20210215]"));
        assert!(message.contains("Bill1 [20210101, 20210131]"));

        // The following month is free
        invoke(&mut store, |tx| {
            generate_bill(tx, "Bill2", "FuelCell1", "20210201", "20210228")
        })
        .unwrap();
    }

    #[test]
    fn test_billed_usage_is_never_charged_twice() {
        let mut store = reference_ledger();

        invoke(&mut store, |tx| {
            let mut journey1 = read_usage_record(tx, "Journey1")?;
            journey1.billed = true;
            tx.put(&journey1)
        })
        .unwrap();

        let report = invoke(&mut store, |tx| {
            generate_bill(tx, "Bill1", "FuelCell1", "20200101", "20200131")
        })
        .unwrap();

        assert_eq!(report.breakdown.skipped_billed, vec!["Journey1".to_string()]);
        assert_eq!(report.marked, vec!["Journey2"]);
        assert!((report.bill.amount - 306.0).abs() < TOLERANCE);

        // Journey1 kept its single billed write
        assert_eq!(store.history("Journey1").unwrap().len(), 2);
        assert_eq!(store.history("Journey2").unwrap().len(), 2);
    }

    #[test]
    fn test_failed_bill_leaves_store_unchanged() {
        let mut store = reference_ledger();
        let keys_before = store.len();

        // FuelCell3 only arrived on 20210622
        let inactive = invoke(&mut store, |tx| {
            generate_bill(tx, "Bill1", "FuelCell3", "20210101", "20210131")
        })
        .unwrap_err();
        assert_eq!(inactive.category(), ErrorCategory::NotActiveInWindow);

        // Identity taken by a journey: fails at the Persisted stage, after costing
        let duplicate = invoke(&mut store, |tx| {
            generate_bill(tx, "Journey4", "FuelCell2", "20210601", "20210630")
        })
        .unwrap_err();
        assert!(matches!(duplicate, LedgerError::AlreadyExists { .. }));

        let missing = invoke(&mut store, |tx| {
            generate_bill(tx, "Bill1", "FuelCell9", "20210101", "20210131")
        })
        .unwrap_err();
        assert_eq!(missing.category(), ErrorCategory::NotFound);

        let malformed = invoke(&mut store, |tx| {
            generate_bill(tx, "Bill1", "FuelCell1", "2021O101", "20210131")
        })
        .unwrap_err();
        assert_eq!(malformed.category(), ErrorCategory::Validation);

        assert_eq!(store.len(), keys_before);
        assert_eq!(store.history("Journey4").unwrap().len(), 1);
    }

    #[test]
    fn test_fuelcell_moved_between_cars_bills_both_components() {
        let mut store = reference_ledger();

        // Journey3 (Component2, Car2) and Journey4 (Component3, Car3)
        let report = invoke(&mut store, |tx| {
            generate_bill(tx, "Bill1", "FuelCell2", "20210101", "20210630")
        })
        .unwrap();

        assert_eq!(report.marked, vec!["Journey3", "Journey4"]);
        // 2 * (500 * 0.1 + 100 * 0.3) + 530 days * 0.5
        assert!((report.breakdown.usage_total - 160.0).abs() < TOLERANCE);
        assert!((report.bill.amount - 425.0).abs() < TOLERANCE);
    }

    #[test]
    fn test_concurrent_overlapping_bills_cannot_both_commit() {
        let mut store = reference_ledger();

        let first = {
            let mut tx = TxContext::new(&store);
            generate_bill(&mut tx, "BillA", "FuelCell3", "20210701", "20210731").unwrap();
            tx.into_rw_set()
        };
        let second = {
            let mut tx = TxContext::new(&store);
            generate_bill(&mut tx, "BillB", "FuelCell2", "20210715", "20210815").unwrap();
            tx.into_rw_set()
        };

        store.commit(&first).unwrap();
        let err = store.commit(&second).unwrap_err();
        assert!(matches!(err, LedgerError::ReadConflict { .. }));
        assert!(err.is_retryable());

        // Retrying against the new state hits the overlap rule
        let retry = invoke(&mut store, |tx| {
            generate_bill(tx, "BillB", "FuelCell2", "20210715", "20210815")
        })
        .unwrap_err();
        assert!(matches!(retry, LedgerError::OverlappingWindow { .. }));

        println!("✅ Second overlapping bill rejected at commit");
    }

    #[test]
    fn test_bill_against_sqlite_store() {
        let mut store = SqliteWorldState::open_in_memory().unwrap();
        seed(&mut store, &reference_assets());

        let report = invoke(&mut store, |tx| {
            generate_bill(tx, "Bill1", "FuelCell1", "20200101", "20200131")
        })
        .unwrap();
        assert!((report.bill.amount - 436.0).abs() < TOLERANCE);

        let journey2 = invoke(&mut store, |tx| read_usage_record(tx, "Journey2")).unwrap();
        assert!(journey2.billed);

        let history = store.history("Journey2").unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].version, 1);
        assert_eq!(history[1].version, 2);
    }
}
