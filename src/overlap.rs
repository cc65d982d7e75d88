// 🚧 Interval overlap validator
//
// A supplier's billing windows must never collide. Four rules, checked in
// order against every prior bill of the supplier, candidate `[s, e]` versus
// existing `[f, t]`:
//
//   1. s <  f <  e   candidate encloses the existing start
//   2. s <= t <= e   candidate covers the existing end
//   3. f <  s <  t   candidate starts inside the existing window
//   4. f <= e <= t   candidate ends inside the existing window
//
// The strict/inclusive mix decides which back-to-back windows are allowed:
// a window starting the day after the previous one ended is accepted, one
// starting on the day it ended is not.

use crate::dates::Window;
use crate::entities::{AssetKind, BillingRecord};
use crate::error::{LedgerError, Result};
use crate::store::{StateReader, TxContext};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlapRule {
    EnclosesExistingStart,
    CoversExistingEnd,
    StartsInsideExisting,
    EndsInsideExisting,
}

impl OverlapRule {
    pub const ALL: [OverlapRule; 4] = [
        OverlapRule::EnclosesExistingStart,
        OverlapRule::CoversExistingEnd,
        OverlapRule::StartsInsideExisting,
        OverlapRule::EndsInsideExisting,
    ];

    pub fn matches(&self, candidate: &Window, existing: &Window) -> bool {
        let (s, e) = (candidate.start, candidate.end);
        let (f, t) = (existing.start, existing.end);

        match self {
            OverlapRule::EnclosesExistingStart => s < f && f < e,
            OverlapRule::CoversExistingEnd => s <= t && t <= e,
            OverlapRule::StartsInsideExisting => f < s && s < t,
            OverlapRule::EndsInsideExisting => f <= e && e <= t,
        }
    }
}

impl fmt::Display for OverlapRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            OverlapRule::EnclosesExistingStart => "would enclose the start",
            OverlapRule::CoversExistingEnd => "would cover the end",
            OverlapRule::StartsInsideExisting => "would start inside the window",
            OverlapRule::EndsInsideExisting => "would end inside the window",
        };
        f.write_str(text)
    }
}

/// First rule the candidate breaks against a single existing window
pub fn overlap_rule(candidate: &Window, existing: &Window) -> Option<OverlapRule> {
    OverlapRule::ALL
        .into_iter()
        .find(|rule| rule.matches(candidate, existing))
}

/// First prior bill (in the given order) the candidate collides with
pub fn first_overlap<'b>(
    candidate: &Window,
    existing: &'b [BillingRecord],
) -> Option<(OverlapRule, &'b BillingRecord)> {
    existing.iter().find_map(|bill| {
        overlap_rule(candidate, &bill.window()).map(|rule| (rule, bill))
    })
}

/// Reject the candidate window if it collides with any of the supplier's
/// prior bills
pub fn ensure_no_overlap(
    bill_id: &str,
    supplier_id: &str,
    candidate: &Window,
    supplier_bills: &[BillingRecord],
) -> Result<()> {
    let prior: Vec<BillingRecord> = supplier_bills
        .iter()
        .filter(|bill| bill.supplier_id == supplier_id)
        .cloned()
        .collect();

    match first_overlap(candidate, &prior) {
        Some((rule, existing)) => Err(LedgerError::OverlappingWindow {
            bill_id: bill_id.to_string(),
            supplier_id: supplier_id.to_string(),
            candidate: *candidate,
            existing_bill: existing.id.clone(),
            existing: existing.window(),
            rule,
        }),
        None => Ok(()),
    }
}

/// Every bill issued to the supplier, in key order
pub fn bills_for_supplier<S: StateReader + ?Sized>(
    tx: &mut TxContext<'_, S>,
    supplier_id: &str,
) -> Result<Vec<BillingRecord>> {
    let selector = AssetKind::BillingRecord
        .selector()
        .with("supplier_id", supplier_id);
    tx.query_as(&selector)
}
