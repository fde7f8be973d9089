//! Order model shared between the locker backend and its clients
//!
//! - [`Order`]: the record of one checkout and its lifecycle state
//! - [`OrderStatus`]: lifecycle states and the allowed transitions
//! - [`NewOrder`]: checkout request accepted by the order store

pub mod status;
pub mod types;

// Re-exports
pub use status::OrderStatus;
pub use types::*;
