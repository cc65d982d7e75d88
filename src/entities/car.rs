// 🚗 Car - immutable reference data

use crate::dates::Ymd;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Car {
    pub id: String,

    /// YYYYMMDD
    pub manufactured_on: Ymd,

    #[serde(default)]
    pub note: String,
}
