use serde::{Deserialize, Serialize};

use crate::order::OrderStatus;

// ==================== Payloads ====================

/// 握手载荷 (设备 -> 服务端)
///
/// 包含设备的协议版本和订阅的主题模式，用于服务端进行版本校验和转发过滤。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandshakePayload {
    /// 协议版本
    pub version: u16,
    /// 设备唯一标识
    #[serde(default)]
    pub device_id: Option<String>,
    /// 设备名称
    #[serde(default)]
    pub device_name: Option<String>,
    /// 订阅的主题模式 (支持 `+` / `#` 通配符)
    #[serde(default)]
    pub subscriptions: Vec<String>,
}

/// 重新同步信号载荷 (服务端 -> 设备)
///
/// 订阅者落后于广播缓冲区时发送，提示设备通过 HTTP 重新拉取状态。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncPayload {
    /// 原因 (例如 "lagged")
    pub reason: String,
    /// 被丢弃的消息数
    pub skipped: u64,
}

/// 通用响应载荷 (服务端 -> 设备)
///
/// 用于响应握手
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponsePayload {
    /// 是否成功
    pub success: bool,
    /// 响应消息/错误描述
    pub message: String,
    /// 错误代码 (可选, 仅在失败时有用)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<u16>,
}

/// 新订单取餐码 (`orders/{id}/code`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCodeEvent {
    pub order_id: String,
    pub code: String,
}

/// 订单状态变化 (`orders/{id}/status`)
///
/// 创建时 `previous` 为空。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusEvent {
    pub order_id: String,
    pub status: OrderStatus,
    #[serde(default)]
    pub previous: Option<OrderStatus>,
    pub updated_at: i64,
}

// ==================== Convenience Constructors ====================

impl SyncPayload {
    pub fn lagged(skipped: u64) -> Self {
        Self {
            reason: "lagged".to_string(),
            skipped,
        }
    }
}

impl ResponsePayload {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            error_code: None,
        }
    }

    pub fn error(message: impl Into<String>, code: Option<u16>) -> Self {
        Self {
            success: false,
            message: message.into(),
            error_code: code,
        }
    }
}
