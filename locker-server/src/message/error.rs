//! 事件通道错误

use thiserror::Error;

/// Event channel / transport failure
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Event channel is closed")]
    Closed,

    #[error("Invalid topic pattern: {0}")]
    InvalidPattern(String),

    #[error("Failed to encode payload for {topic}: {source}")]
    Encode {
        topic: String,
        source: serde_json::Error,
    },

    #[error("Delivery on {topic} failed after {attempts} attempts: {reason}")]
    DeliveryFailed {
        topic: String,
        attempts: u32,
        reason: String,
    },

    #[error("Peer disconnected")]
    Disconnected,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),
}
