// ⚡ Fuelcell - a leased unit and the rate plan it is billed under
//
// Rates:
//   base_rate     - per billed day
//   distance_rate - per unit of distance driven
//   energy_rate   - per unit of fuel, weighted by journey efficiency

use crate::dates::{Ymd, STILL_ACTIVE};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fuelcell {
    pub id: String,

    /// Supplier that leases the unit and bills for it
    pub supplier_id: String,

    pub base_rate: f32,
    pub distance_rate: f32,
    pub energy_rate: f32,

    /// Currency every bill for this unit is issued in
    pub currency: String,

    pub received_at: Ymd,

    /// 0 while still in service
    #[serde(default)]
    pub returned_at: Ymd,

    #[serde(default)]
    pub note: String,
}

impl Fuelcell {
    pub fn is_in_service(&self) -> bool {
        self.returned_at == STILL_ACTIVE
    }
}
