// 🧪 Shared test fixtures
//
// The reference ledger: three cars, four components, two suppliers, three
// fuelcells and six journeys. FuelCell2 moves from Car2 to Car3 on 20210623
// while FuelCell3 takes its place in Car2.

use crate::dates::{Window, Ymd, STILL_ACTIVE};
use crate::entities::{Asset, Car, Component, Fuelcell, Supplier, UsageRecord};
use crate::store::{invoke, MemoryWorldState, WorldState};

pub fn window(start: Ymd, end: Ymd) -> Window {
    Window { start, end }
}

pub fn car(id: &str, manufactured_on: Ymd) -> Asset {
    Asset::Car(Car {
        id: id.to_string(),
        manufactured_on,
        note: String::new(),
    })
}

pub fn component(id: &str, car_id: &str, fuelcell_id: &str, installed_at: Ymd, removed_at: Ymd) -> Asset {
    Asset::Component(Component {
        id: id.to_string(),
        car_id: car_id.to_string(),
        fuelcell_id: fuelcell_id.to_string(),
        installed_at,
        removed_at,
    })
}

pub fn supplier(id: &str, name: &str) -> Asset {
    Asset::Supplier(Supplier {
        id: id.to_string(),
        name: name.to_string(),
        note: String::new(),
    })
}

pub fn fuelcell(id: &str, supplier_id: &str, rates: (f32, f32, f32), received_at: Ymd) -> Asset {
    let (base_rate, distance_rate, energy_rate) = rates;
    Asset::Fuelcell(Fuelcell {
        id: id.to_string(),
        supplier_id: supplier_id.to_string(),
        base_rate,
        distance_rate,
        energy_rate,
        currency: "GBP".to_string(),
        received_at,
        returned_at: STILL_ACTIVE,
        note: String::new(),
    })
}

#[allow(clippy::too_many_arguments)]
pub fn journey(
    id: &str,
    car_id: &str,
    component_id: &str,
    odometer_start: u32,
    distance: u32,
    fuel_used: u32,
    efficiency: f32,
    occurred_on: Ymd,
) -> UsageRecord {
    UsageRecord {
        id: id.to_string(),
        car_id: car_id.to_string(),
        component_id: component_id.to_string(),
        odometer_start,
        distance,
        fuel_used,
        efficiency,
        occurred_on,
        billed: false,
        note: String::new(),
    }
}

pub fn reference_assets() -> Vec<Asset> {
    vec![
        car("Car1", 20200123),
        car("Car2", 20210123),
        car("Car3", 20220123),
        supplier("Supplier1", "Hydrogen1"),
        supplier("Supplier2", "EfficentCells"),
        fuelcell("FuelCell1", "Supplier1", (1.0, 0.2, 1.0), 20200122),
        fuelcell("FuelCell2", "Supplier2", (0.5, 0.1, 1.0), 20210122),
        fuelcell("FuelCell3", "Supplier2", (0.8, 0.2, 1.0), 20210622),
        component("Component1", "Car1", "FuelCell1", 20200123, STILL_ACTIVE),
        component("Component2", "Car2", "FuelCell2", 20210123, 20210623),
        component("Component3", "Car3", "FuelCell2", 20210623, STILL_ACTIVE),
        component("Component4", "Car2", "FuelCell3", 20210623, STILL_ACTIVE),
        Asset::UsageRecord(journey("Journey1", "Car1", "Component1", 0, 500, 100, 0.3, 20200123)),
        Asset::UsageRecord(journey("Journey2", "Car1", "Component1", 500, 1000, 150, 0.5, 20200127)),
        Asset::UsageRecord(journey("Journey3", "Car2", "Component2", 0, 500, 100, 0.3, 20210127)),
        Asset::UsageRecord(journey("Journey4", "Car3", "Component3", 0, 500, 100, 0.3, 20210627)),
        Asset::UsageRecord(journey("Journey5", "Car2", "Component4", 500, 500, 100, 0.3, 20210627)),
        Asset::UsageRecord(journey("Journey6", "Car1", "Component1", 10000, 500, 100, 0.3, 20210627)),
    ]
}

/// Write assets straight into the store, bypassing reference checks
pub fn seed<S: WorldState + ?Sized>(store: &mut S, assets: &[Asset]) {
    invoke(store, |tx| {
        for asset in assets {
            tx.put_asset(asset)?;
        }
        Ok(())
    })
    .expect("seeding the fixture must succeed");
}

pub fn reference_ledger() -> MemoryWorldState {
    let mut store = MemoryWorldState::new();
    seed(&mut store, &reference_assets());
    store
}
