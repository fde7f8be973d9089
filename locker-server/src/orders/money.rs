//! Money calculation and order input validation
//!
//! All calculations are done using `Decimal` internally, then converted to `f64`
//! for storage/serialization.

use rust_decimal::prelude::*;
use shared::order::{NewOrder, OrderItem};
use thiserror::Error;

/// Rounding strategy for monetary values (2 decimal places, half-up)
const DECIMAL_PLACES: u32 = 2;

/// Tolerance for monetary comparisons (0.01)
pub const MONEY_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Maximum allowed price per item
const MAX_PRICE: f64 = 1_000_000.0;
/// Maximum allowed quantity per item
const MAX_QUANTITY: u32 = 9999;

/// Malformed order input
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Order must contain at least one item")]
    EmptyOrder,

    #[error("Order owner is required")]
    MissingOwner,

    #[error("Item {index}: quantity must be between 1 and {max}, got {quantity}", max = MAX_QUANTITY)]
    InvalidQuantity { index: usize, quantity: u32 },

    #[error("Item {index}: price must be a finite non-negative number, got {price}")]
    InvalidPrice { index: usize, price: f64 },

    #[error("Declared total {declared} does not match item sum {computed}")]
    TotalMismatch { declared: f64, computed: f64 },
}

impl ValidationError {
    /// Offending item position, when the error is about one item
    pub fn item_index(&self) -> Option<usize> {
        match self {
            Self::InvalidQuantity { index, .. } | Self::InvalidPrice { index, .. } => Some(*index),
            _ => None,
        }
    }
}

/// Convert f64 to Decimal for calculation
#[inline]
pub fn to_decimal(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or_default()
}

/// Convert Decimal back to f64 for storage, rounded to 2 decimal places
#[inline]
pub fn to_f64(value: Decimal) -> f64 {
    value
        .round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
        .to_f64()
        .unwrap_or_default()
}

/// Compare two monetary values for equality (within 0.01 tolerance)
pub fn money_eq(a: f64, b: f64) -> bool {
    let diff = (to_decimal(a) - to_decimal(b)).abs();
    diff < MONEY_TOLERANCE
}

fn validate_item(index: usize, item: &OrderItem) -> Result<(), ValidationError> {
    if item.quantity == 0 || item.quantity > MAX_QUANTITY {
        return Err(ValidationError::InvalidQuantity {
            index,
            quantity: item.quantity,
        });
    }
    if !item.unit_price.is_finite() || item.unit_price < 0.0 || item.unit_price > MAX_PRICE {
        return Err(ValidationError::InvalidPrice {
            index,
            price: item.unit_price,
        });
    }
    Ok(())
}

/// `sum(unit_price × quantity)`, rounded to cents
pub fn order_total(items: &[OrderItem]) -> f64 {
    let sum: Decimal = items
        .iter()
        .map(|item| to_decimal(item.unit_price) * Decimal::from(item.quantity))
        .sum();
    to_f64(sum)
}

/// Validate checkout input and return the computed total
pub fn validate_order(input: &NewOrder) -> Result<f64, ValidationError> {
    if input.owner_id.trim().is_empty() {
        return Err(ValidationError::MissingOwner);
    }
    if input.items.is_empty() {
        return Err(ValidationError::EmptyOrder);
    }
    for (index, item) in input.items.iter().enumerate() {
        validate_item(index, item)?;
    }

    let computed = order_total(&input.items);
    if let Some(declared) = input.total
        && (!declared.is_finite() || !money_eq(declared, computed))
    {
        return Err(ValidationError::TotalMismatch { declared, computed });
    }

    Ok(computed)
}
