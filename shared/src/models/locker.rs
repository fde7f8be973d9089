//! Locker (box) models

use serde::{Deserialize, Serialize};

/// Public projection of the box state
///
/// `is_occupied` is true exactly when an order holds the reservation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct BoxStatus {
    pub is_occupied: bool,
    #[serde(default)]
    pub reserved_for_user_id: Option<String>,
    /// Orders that are ready and waiting for the box
    #[serde(default)]
    pub waiting: usize,
}

/// Keypad input, either `{"code":"1234"}` or a bare string
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeypadInput {
    pub code: String,
}

/// Outcome of one keypad attempt
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeypadResult {
    pub matched: bool,
    /// Delivered order, present when matched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
}
