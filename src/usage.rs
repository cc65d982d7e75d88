// 🛣️ Usage selector
//
// Journeys that fall inside a billing window. Unlike the lifecycle filters,
// the window is exclusive here: a journey dated exactly on either boundary
// is never billed by that window.

use crate::dates::Window;
use crate::entities::{Asset, AssetKind, UsageRecord};
use crate::error::Result;
use crate::store::{asset_type_of, StateReader, TxContext};

/// Journeys on the component strictly inside the window, in key order
pub fn usage_in_window<S: StateReader + ?Sized>(
    tx: &mut TxContext<'_, S>,
    component_id: &str,
    window: &Window,
) -> Result<Vec<UsageRecord>> {
    let selector = AssetKind::UsageRecord
        .selector()
        .with("component_id", component_id);

    let records: Vec<UsageRecord> = tx.query_as(&selector)?;
    Ok(records
        .into_iter()
        .filter(|record| window.strictly_contains(record.occurred_on))
        .collect())
}

pub fn usage_for_car<S: StateReader + ?Sized>(
    tx: &mut TxContext<'_, S>,
    car_id: &str,
) -> Result<Vec<UsageRecord>> {
    let selector = AssetKind::UsageRecord.selector().with("car_id", car_id);
    tx.query_as(&selector)
}

/// Same result as [`usage_for_car`], found by walking the whole keyspace.
///
/// Records of other kinds are skipped without being decoded as journeys.
pub fn usage_for_car_by_scan<S: StateReader + ?Sized>(
    tx: &mut TxContext<'_, S>,
    car_id: &str,
) -> Result<Vec<UsageRecord>> {
    let journey_tag = AssetKind::UsageRecord.tag();
    let mut records = Vec::new();

    for (key, raw) in tx.scan_range("", "")? {
        if asset_type_of(&raw).as_deref() != Some(journey_tag) {
            continue;
        }

        if let Asset::UsageRecord(record) = Asset::from_json(&key, &raw)? {
            if record.car_id == car_id {
                records.push(record);
            }
        }
    }

    Ok(records)
}

/// Every journey strictly inside the window, across all components
pub fn usage_between<S: StateReader + ?Sized>(
    tx: &mut TxContext<'_, S>,
    window: &Window,
) -> Result<Vec<UsageRecord>> {
    let records: Vec<UsageRecord> = tx.all()?;
    Ok(records
        .into_iter()
        .filter(|record| window.strictly_contains(record.occurred_on))
        .collect())
}
