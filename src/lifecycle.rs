// ⏳ Entity lifecycle filters
//
// Decide whether a component or fuelcell was present during a billing
// window. Both checks are inclusive at the boundaries: a component removed
// on the window's first day, or installed on its last day, still counts.

use crate::dates::{Window, Ymd, STILL_ACTIVE};
use crate::entities::{AssetKind, Component, Fuelcell};
use crate::error::{LedgerError, Result};
use crate::store::{StateReader, TxContext};
use std::fmt;

/// Why a fuelcell fails the in-service check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InactiveReason {
    /// Received after the window closed
    NotYetReceived { received_at: Ymd },

    /// Returned before the window opened
    ReturnedBefore { returned_at: Ymd },
}

impl fmt::Display for InactiveReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InactiveReason::NotYetReceived { received_at } => {
                write!(f, "not received until {}", received_at)
            }
            InactiveReason::ReturnedBefore { returned_at } => {
                write!(f, "returned on {}", returned_at)
            }
        }
    }
}

/// Component present at any point of the window
pub fn component_active_in(component: &Component, window: &Window) -> bool {
    (component.removed_at == STILL_ACTIVE || window.start <= component.removed_at)
        && component.installed_at <= window.end
}

pub fn fuelcell_inactive_reason(fuelcell: &Fuelcell, window: &Window) -> Option<InactiveReason> {
    if fuelcell.received_at > window.end {
        return Some(InactiveReason::NotYetReceived {
            received_at: fuelcell.received_at,
        });
    }

    if fuelcell.returned_at != STILL_ACTIVE && fuelcell.returned_at < window.start {
        return Some(InactiveReason::ReturnedBefore {
            returned_at: fuelcell.returned_at,
        });
    }

    None
}

pub fn ensure_fuelcell_in_service(fuelcell: &Fuelcell, window: &Window) -> Result<()> {
    match fuelcell_inactive_reason(fuelcell, window) {
        Some(reason) => Err(LedgerError::NotActiveInWindow {
            fuelcell_id: fuelcell.id.clone(),
            window: *window,
            reason,
        }),
        None => Ok(()),
    }
}

/// Components that carried the fuelcell at some point of the window.
///
/// A fuelcell moved between cars mid-window yields one component per car.
pub fn active_components_for<S: StateReader + ?Sized>(
    tx: &mut TxContext<'_, S>,
    fuelcell_id: &str,
    window: &Window,
) -> Result<Vec<Component>> {
    let selector = AssetKind::Component
        .selector()
        .with("fuelcell_id", fuelcell_id);

    let components: Vec<Component> = tx.query_as(&selector)?;
    Ok(components
        .into_iter()
        .filter(|component| component_active_in(component, window))
        .collect())
}

/// A supplier's fuelcells that pass the in-service check for the window
pub fn fuelcells_in_service_for_supplier<S: StateReader + ?Sized>(
    tx: &mut TxContext<'_, S>,
    supplier_id: &str,
    window: &Window,
) -> Result<Vec<Fuelcell>> {
    let selector = AssetKind::Fuelcell
        .selector()
        .with("supplier_id", supplier_id);

    let fuelcells: Vec<Fuelcell> = tx.query_as(&selector)?;
    Ok(fuelcells
        .into_iter()
        .filter(|fuelcell| fuelcell_inactive_reason(fuelcell, window).is_none())
        .collect())
}
