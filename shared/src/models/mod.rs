//! Data models
//!
//! Shared between locker-server and clients (via API and device link).

pub mod inventory;
pub mod locker;
pub mod telemetry;

// Re-exports
pub use inventory::*;
pub use locker::*;
pub use telemetry::*;
