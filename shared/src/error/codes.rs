//! Unified error codes for the locker backend
//!
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 2xxx: Permission errors
//! - 4xxx: Order errors
//! - 6xxx: Product / inventory errors
//! - 7xxx: Locker errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values for efficient serialization
/// and cross-language compatibility (Rust, TypeScript, etc.)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Invalid request
    InvalidRequest = 5,

    // ==================== 2xxx: Permission ====================
    /// Admin role required
    AdminRequired = 2003,

    // ==================== 4xxx: Order ====================
    /// Order not found
    OrderNotFound = 4001,
    /// Status change not allowed from the current status
    InvalidTransition = 4002,
    /// Order has no items
    OrderEmpty = 4003,
    /// Item quantity below 1
    InvalidQuantity = 4004,
    /// Item price negative or not finite
    InvalidPrice = 4005,
    /// Declared total does not match the item sum
    TotalMismatch = 4006,
    /// No free pickup code left among active orders
    CodeSpaceExhausted = 4007,

    // ==================== 6xxx: Product ====================
    /// Product id is empty or malformed
    InvalidProduct = 6001,

    // ==================== 7xxx: Locker ====================
    /// Box is reserved by another order
    BoxBusy = 7001,

    // ==================== 9xxx: System ====================
    /// Database error
    DatabaseError = 9002,
    /// Event channel delivery failed
    TransportError = 9003,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Whether the caller may retry the same request later
    #[inline]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, ErrorCode::BoxBusy | ErrorCode::TransportError)
    }

    /// Get the developer-facing English message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::InvalidRequest => "Invalid request",

            // Permission
            ErrorCode::AdminRequired => "Administrator role is required",

            // Order
            ErrorCode::OrderNotFound => "Order not found",
            ErrorCode::InvalidTransition => "Order status change is not allowed",
            ErrorCode::OrderEmpty => "Order is empty",
            ErrorCode::InvalidQuantity => "Item quantity must be at least 1",
            ErrorCode::InvalidPrice => "Item price must be a non-negative number",
            ErrorCode::TotalMismatch => "Order total does not match its items",
            ErrorCode::CodeSpaceExhausted => "No pickup code available",

            // Product
            ErrorCode::InvalidProduct => "Invalid product id",

            // Locker
            ErrorCode::BoxBusy => "Box is busy with another pickup",

            // System
            ErrorCode::DatabaseError => "Database error",
            ErrorCode::TransportError => "Event delivery failed",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl From<ErrorCode> for u16 {
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error returned when converting an unknown numeric code
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid error code: {0}")]
pub struct InvalidErrorCode(pub u16);

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        let code = match value {
            2 => ErrorCode::ValidationFailed,
            3 => ErrorCode::NotFound,
            5 => ErrorCode::InvalidRequest,
            2003 => ErrorCode::AdminRequired,
            4001 => ErrorCode::OrderNotFound,
            4002 => ErrorCode::InvalidTransition,
            4003 => ErrorCode::OrderEmpty,
            4004 => ErrorCode::InvalidQuantity,
            4005 => ErrorCode::InvalidPrice,
            4006 => ErrorCode::TotalMismatch,
            4007 => ErrorCode::CodeSpaceExhausted,
            6001 => ErrorCode::InvalidProduct,
            7001 => ErrorCode::BoxBusy,
            9002 => ErrorCode::DatabaseError,
            9003 => ErrorCode::TransportError,
            other => return Err(InvalidErrorCode(other)),
        };
        Ok(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_roundtrip_through_u16() {
        for code in [
            ErrorCode::ValidationFailed,
            ErrorCode::OrderNotFound,
            ErrorCode::InvalidTransition,
            ErrorCode::BoxBusy,
            ErrorCode::TransportError,
        ] {
            assert_eq!(ErrorCode::try_from(code.code()).unwrap(), code);
        }
    }

    #[test]
    fn test_unknown_code_rejected() {
        assert_eq!(ErrorCode::try_from(4242), Err(InvalidErrorCode(4242)));
        assert_eq!(ErrorCode::try_from(0), Err(InvalidErrorCode(0)));
    }

    #[test]
    fn test_retryable_codes() {
        assert!(ErrorCode::BoxBusy.is_retryable());
        assert!(ErrorCode::TransportError.is_retryable());
        assert!(!ErrorCode::InvalidTransition.is_retryable());
        assert!(!ErrorCode::ValidationFailed.is_retryable());
    }

    #[test]
    fn test_serialize_as_number() {
        let json = serde_json::to_string(&ErrorCode::BoxBusy).unwrap();
        assert_eq!(json, "7001");
        let code: ErrorCode = serde_json::from_str("4002").unwrap();
        assert_eq!(code, ErrorCode::InvalidTransition);
    }
}
