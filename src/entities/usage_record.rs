// 🛣️ Usage record ("journey") - one trip driven on a component
//
// Only `billed` changes after creation, and only from false to true.

use crate::dates::Ymd;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub id: String,
    pub car_id: String,
    pub component_id: String,

    /// Odometer reading when the journey started
    pub odometer_start: u32,

    pub distance: u32,

    /// Fuel consumed (grams of hydrogen)
    pub fuel_used: u32,

    /// How efficiently the cell converted fuel, 0..=1
    pub efficiency: f32,

    pub occurred_on: Ymd,

    /// Already priced into a bill
    #[serde(default)]
    pub billed: bool,

    #[serde(default)]
    pub note: String,
}
