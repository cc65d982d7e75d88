// 🧾 Billing record - immutable once written

use crate::dates::{Window, Ymd};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingRecord {
    pub id: String,
    pub supplier_id: String,
    pub fuelcell_id: String,

    /// Inclusive window start
    pub date_from: Ymd,

    /// Inclusive window end
    pub date_to: Ymd,

    pub currency: String,
    pub amount: f32,
}

impl BillingRecord {
    pub fn window(&self) -> Window {
        Window {
            start: self.date_from,
            end: self.date_to,
        }
    }
}
