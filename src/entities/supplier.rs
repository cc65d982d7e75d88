// 🏭 Supplier - owner of leased fuelcells, immutable reference data

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Supplier {
    pub id: String,

    /// Display name
    pub name: String,

    #[serde(default)]
    pub note: String,
}
