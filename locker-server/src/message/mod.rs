//! 事件通道 (Event/Command Channel)
//!
//! ```text
//! ┌─────────────┐  publish   ┌──────────────┐  subscribe(pattern)  ┌──────────────┐
//! │ OrdersMgr   │ ─────────▶ │ EventChannel │ ───────────────────▶ │ Subscription │
//! │ BoxCoord    │            │  (broadcast) │                      └──────────────┘
//! │ Telemetry   │            └──────┬───────┘
//! └─────────────┘                   │ write_message (可靠/尽力)
//!                                   ▼
//!                         Transport / 设备链路 (TCP)
//! ```

pub mod bus;
mod error;
pub mod handler;
pub mod subscription;
pub mod tcp_server;
pub mod transport;

pub use bus::{ChannelConfig, EventChannel, SinkFilter};
pub use error::TransportError;
pub use handler::KeypadListener;
pub use shared::message::{BusMessage, EventType};
pub use subscription::{Subscription, SubscriptionError};
pub use transport::{MemoryTransport, TcpTransport, Transport};

use serde::Serialize;

/// 已连接设备信息
#[derive(Debug, Clone, Serialize)]
pub struct ConnectedDevice {
    pub id: String,
    pub name: Option<String>,
    pub addr: Option<String>,
    pub subscriptions: Vec<String>,
}
