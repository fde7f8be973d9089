//! Menu availability flags

use serde::{Deserialize, Serialize};

/// Availability flag of one product
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InventoryFlag {
    pub product_id: String,
    pub available: bool,
}

/// Admin update body
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InventoryUpdate {
    pub available: bool,
}
