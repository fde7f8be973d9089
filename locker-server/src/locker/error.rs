use crate::message::TransportError;
use crate::orders::manager::ManagerError;
use shared::order::OrderStatus;
use thiserror::Error;

/// Box coordinator errors
#[derive(Debug, Error)]
pub enum LockerError {
    /// Another order holds the box; retry after it is released
    #[error("Box is reserved by order {holder}")]
    BoxBusy { holder: String },

    #[error("Order {order_id} is {status}, only ready orders can take the box")]
    NotReady {
        order_id: String,
        status: OrderStatus,
    },

    #[error(transparent)]
    Order(#[from] ManagerError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

pub type LockerResult<T> = Result<T, LockerError>;
