use super::super::storage::StorageError;
use crate::message::TransportError;
use crate::orders::money::ValidationError;
use shared::order::OrderStatus;
use thiserror::Error;

/// Manager errors
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Invalid order: {0}")]
    Validation(#[from] ValidationError),

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Order {order_id} cannot move from {from} to {to}")]
    InvalidTransition {
        order_id: String,
        from: OrderStatus,
        to: OrderStatus,
    },

    #[error("No free pickup code among active orders")]
    CodeSpaceExhausted,
}

pub type ManagerResult<T> = Result<T, ManagerError>;
