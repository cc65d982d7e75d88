// Entity Models
//
// Every record lives in the world state as JSON under its identity key,
// tagged with `asset_type`. Identities are unique across all kinds.

pub mod billing_record;
pub mod car;
pub mod component;
pub mod fuelcell;
pub mod supplier;
pub mod usage_record;

pub use billing_record::BillingRecord;
pub use car::Car;
pub use component::Component;
pub use fuelcell::Fuelcell;
pub use supplier::Supplier;
pub use usage_record::UsageRecord;

use crate::error::{LedgerError, Result};
use crate::store::{Selector, StateReader, TxContext};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// ASSET KIND
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetKind {
    Car,
    Component,
    Supplier,
    Fuelcell,
    UsageRecord,
    BillingRecord,
}

impl AssetKind {
    pub const ALL: [AssetKind; 6] = [
        AssetKind::Car,
        AssetKind::Component,
        AssetKind::Supplier,
        AssetKind::Fuelcell,
        AssetKind::UsageRecord,
        AssetKind::BillingRecord,
    ];

    /// Value of the stored `asset_type` attribute
    pub fn tag(&self) -> &'static str {
        match self {
            AssetKind::Car => "Car",
            AssetKind::Component => "Component",
            AssetKind::Supplier => "Supplier",
            AssetKind::Fuelcell => "Fuelcell",
            AssetKind::UsageRecord => "Journey",
            AssetKind::BillingRecord => "Bill",
        }
    }

    /// Accepts the stored tag or the human name, case-insensitively
    pub fn parse(name: &str) -> Option<AssetKind> {
        let lower = name.to_lowercase();
        AssetKind::ALL.into_iter().find(|kind| {
            kind.tag().to_lowercase() == lower
                || kind.to_string().replace(' ', "-") == lower
                || kind.to_string() == lower
        })
    }

    /// Selector over every record of this kind
    pub fn selector(&self) -> Selector {
        Selector::new(self.tag())
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AssetKind::Car => "car",
            AssetKind::Component => "component",
            AssetKind::Supplier => "supplier",
            AssetKind::Fuelcell => "fuelcell",
            AssetKind::UsageRecord => "usage record",
            AssetKind::BillingRecord => "bill",
        };
        f.write_str(name)
    }
}

// ============================================================================
// ASSET (tagged union of every stored record)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "asset_type")]
pub enum Asset {
    Car(Car),
    Component(Component),
    Supplier(Supplier),
    Fuelcell(Fuelcell),
    #[serde(rename = "Journey")]
    UsageRecord(UsageRecord),
    #[serde(rename = "Bill")]
    BillingRecord(BillingRecord),
}

impl Asset {
    pub fn kind(&self) -> AssetKind {
        match self {
            Asset::Car(_) => AssetKind::Car,
            Asset::Component(_) => AssetKind::Component,
            Asset::Supplier(_) => AssetKind::Supplier,
            Asset::Fuelcell(_) => AssetKind::Fuelcell,
            Asset::UsageRecord(_) => AssetKind::UsageRecord,
            Asset::BillingRecord(_) => AssetKind::BillingRecord,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Asset::Car(car) => &car.id,
            Asset::Component(component) => &component.id,
            Asset::Supplier(supplier) => &supplier.id,
            Asset::Fuelcell(fuelcell) => &fuelcell.id,
            Asset::UsageRecord(record) => &record.id,
            Asset::BillingRecord(bill) => &bill.id,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|source| LedgerError::Serialization {
            key: self.id().to_string(),
            source,
        })
    }

    pub fn from_json(key: &str, raw: &str) -> Result<Asset> {
        serde_json::from_str(raw).map_err(|source| LedgerError::Serialization {
            key: key.to_string(),
            source,
        })
    }
}

/// A concrete record type that can be stored as an [`Asset`]
pub trait LedgerAsset: Sized + Clone {
    const KIND: AssetKind;

    fn id(&self) -> &str;
    fn to_asset(&self) -> Asset;
    fn from_asset(asset: Asset) -> Option<Self>;
}

macro_rules! ledger_asset {
    ($ty:ident, $variant:ident) => {
        impl LedgerAsset for $ty {
            const KIND: AssetKind = AssetKind::$variant;

            fn id(&self) -> &str {
                &self.id
            }

            fn to_asset(&self) -> Asset {
                Asset::$variant(self.clone())
            }

            fn from_asset(asset: Asset) -> Option<Self> {
                match asset {
                    Asset::$variant(inner) => Some(inner),
                    _ => None,
                }
            }
        }
    };
}

ledger_asset!(Car, Car);
ledger_asset!(Component, Component);
ledger_asset!(Supplier, Supplier);
ledger_asset!(Fuelcell, Fuelcell);
ledger_asset!(UsageRecord, UsageRecord);
ledger_asset!(BillingRecord, BillingRecord);

// ============================================================================
// TYPED ACCESS
// ============================================================================

impl<S: StateReader + ?Sized> TxContext<'_, S> {
    pub fn get_asset(&mut self, id: &str) -> Result<Option<Asset>> {
        match self.get_state(id)? {
            Some(raw) => Asset::from_json(id, &raw).map(Some),
            None => Ok(None),
        }
    }

    /// `None` when the key is absent or holds a different kind of record
    pub fn get<T: LedgerAsset>(&mut self, id: &str) -> Result<Option<T>> {
        Ok(self.get_asset(id)?.and_then(T::from_asset))
    }

    pub fn require<T: LedgerAsset>(&mut self, id: &str) -> Result<T> {
        self.get(id)?.ok_or_else(|| LedgerError::NotFound {
            kind: T::KIND,
            id: id.to_string(),
        })
    }

    pub fn put_asset(&mut self, asset: &Asset) -> Result<()> {
        let raw = asset.to_json()?;
        self.put_state(asset.id(), raw);
        Ok(())
    }

    pub fn put<T: LedgerAsset>(&mut self, record: &T) -> Result<()> {
        self.put_asset(&record.to_asset())
    }

    /// Records of one kind matching the selector, in key order
    pub fn query_as<T: LedgerAsset>(&mut self, selector: &Selector) -> Result<Vec<T>> {
        self.query(selector)?
            .into_iter()
            .map(|(key, raw)| {
                let asset = Asset::from_json(&key, &raw)?;
                let found = asset.kind();
                T::from_asset(asset).ok_or_else(|| LedgerError::Corrupt {
                    key,
                    reason: format!("selector for {} returned a {}", T::KIND, found),
                })
            })
            .collect()
    }

    pub fn all<T: LedgerAsset>(&mut self) -> Result<Vec<T>> {
        self.query_as(&T::KIND.selector())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{invoke, MemoryWorldState};

    #[test]
    fn test_tags_round_trip_through_serde() {
        let car = Asset::Car(Car {
            id: "Car1".to_string(),
            manufactured_on: 20200123,
            note: "the first test car".to_string(),
        });

        let raw = car.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["asset_type"], "Car");
        assert_eq!(Asset::from_json("Car1", &raw).unwrap(), car);

        for kind in AssetKind::ALL {
            assert_eq!(AssetKind::parse(kind.tag()), Some(kind));
        }
        assert_eq!(AssetKind::parse("usage-record"), Some(AssetKind::UsageRecord));
        assert_eq!(AssetKind::parse("journey"), Some(AssetKind::UsageRecord));
        assert_eq!(AssetKind::parse("truck"), None);
    }

    #[test]
    fn test_typed_access_checks_kind() {
        let mut store = MemoryWorldState::new();
        invoke(&mut store, |tx| {
            tx.put(&Supplier {
                id: "Supplier1".to_string(),
                name: "Hydrogen1".to_string(),
                note: String::new(),
            })
        })
        .unwrap();

        let mut tx = TxContext::new(&store);
        assert!(tx.get::<Supplier>("Supplier1").unwrap().is_some());
        assert!(tx.get::<Fuelcell>("Supplier1").unwrap().is_none());

        let err = tx.require::<Fuelcell>("Supplier1").unwrap_err();
        assert!(matches!(
            err,
            LedgerError::NotFound {
                kind: AssetKind::Fuelcell,
                ..
            }
        ));

        assert_eq!(tx.all::<Supplier>().unwrap().len(), 1);
        assert!(tx.all::<Car>().unwrap().is_empty());
    }
}
