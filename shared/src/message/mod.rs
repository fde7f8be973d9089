//! 消息总线消息类型定义
//!
//! 这些类型在 locker-server 和设备/客户端之间共享，用于
//! 进程内（内存）和网络（TCP）通信。

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

use uuid::Uuid;

pub mod payload;
pub mod topic;
pub use payload::*;

/// 协议版本号
pub const PROTOCOL_VERSION: u16 = 1;

/// 消息总线事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    /// 握手消息 (设备 -> 服务端)
    Handshake = 0,
    /// 主题发布
    Publish = 1,
    /// 重新同步信号 (订阅者丢失消息后)
    Sync = 2,
    /// 握手响应
    Response = 3,
}

impl TryFrom<u8> for EventType {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(EventType::Handshake),
            1 => Ok(EventType::Publish),
            2 => Ok(EventType::Sync),
            3 => Ok(EventType::Response),
            _ => Err(()),
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventType::Handshake => write!(f, "handshake"),
            EventType::Publish => write!(f, "publish"),
            EventType::Sync => write!(f, "sync"),
            EventType::Response => write!(f, "response"),
        }
    }
}

/// 消息总线消息体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusMessage {
    pub request_id: Uuid,
    pub event_type: EventType,
    /// 主题 (例如 `orders/{id}/status`)，非发布消息为空
    #[serde(default)]
    pub topic: String,
    /// 发送方 (设备 ID 或内部组件名)
    #[serde(default)]
    pub source: Option<String>,
    pub payload: serde_json::Value,
    /// 发布时间 (Unix 毫秒)
    #[serde(default)]
    pub published_at: i64,
}

impl BusMessage {
    pub fn new(event_type: EventType, topic: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            event_type,
            topic: topic.into(),
            source: None,
            payload,
            published_at: crate::util::now_millis(),
        }
    }

    /// 创建主题发布消息
    pub fn publish(topic: impl Into<String>, payload: serde_json::Value) -> Self {
        Self::new(EventType::Publish, topic, payload)
    }

    /// 设置发送方
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// 创建握手消息
    pub fn handshake(payload: &HandshakePayload) -> Result<Self, serde_json::Error> {
        Ok(Self::new(
            EventType::Handshake,
            "",
            serde_json::to_value(payload)?,
        ))
    }

    /// 创建重新同步信号消息
    pub fn sync(payload: &SyncPayload) -> Result<Self, serde_json::Error> {
        Ok(Self::new(EventType::Sync, "", serde_json::to_value(payload)?))
    }

    /// 创建响应消息
    pub fn response(payload: &ResponsePayload) -> Result<Self, serde_json::Error> {
        Ok(Self::new(
            EventType::Response,
            "",
            serde_json::to_value(payload)?,
        ))
    }

    /// 是否为主题发布消息
    pub fn is_publish(&self) -> bool {
        matches!(self.event_type, EventType::Publish)
    }

    /// 解析载荷为指定类型
    pub fn parse_payload<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.payload)
    }
}
