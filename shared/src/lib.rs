//! Shared types for the smart locker backend
//!
//! Common types used by locker-server and its clients including the
//! order model, bus messages, topic names, error types and response
//! structures.

pub mod error;
pub mod message;
pub mod models;
pub mod order;
pub mod util;

// Re-exports
pub use axum::Json;
pub use http;
pub use serde::{Deserialize, Serialize};

// Message bus re-exports (for convenient access)
pub use message::{BusMessage, EventType};

pub use error::{AppError, AppResult, ErrorCode, ErrorResponse};
