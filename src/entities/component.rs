// 🔧 Component - one physical installation of a fuelcell into a car
//
// Created once per installation event. `removed_at` is the only field that
// ever changes, and only once: from the sentinel 0 to the removal date.

use crate::dates::{Ymd, STILL_ACTIVE};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub id: String,

    /// Car the component is fitted to
    pub car_id: String,

    /// Fuelcell installed by this component
    pub fuelcell_id: String,

    pub installed_at: Ymd,

    /// 0 while still installed
    #[serde(default)]
    pub removed_at: Ymd,
}

impl Component {
    pub fn is_installed(&self) -> bool {
        self.removed_at == STILL_ACTIVE
    }
}
