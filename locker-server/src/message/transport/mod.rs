//! Transport 传输层抽象
//!
//! ```text
//!         ┌────────────────────┐
//!         │   Transport Trait  │  ◄── 可插拔接口
//!         └────────┬───────────┘
//!                  │
//!          ┌───────┴───────┐
//!          ▼               ▼
//!    TcpTransport    MemoryTransport
//!    (设备链路)       (同进程通信)
//! ```
//!
//! 帧格式：`u32` 小端长度 + JSON 编码的 [`BusMessage`]。

mod memory;
mod tcp;

pub use memory::MemoryTransport;
pub use tcp::TcpTransport;

use async_trait::async_trait;
use shared::message::BusMessage;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use super::TransportError;

/// 单帧最大字节数
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// Transport 传输层特征
///
/// 所有传输实现必须实现此特征，支持消息的读写和连接管理。
/// 注册到 [`EventChannel`](super::EventChannel) 的传输只作为出站端使用。
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// 从传输层读取一条消息
    async fn read_message(&self) -> Result<BusMessage, TransportError>;

    /// 向传输层写入一条消息
    async fn write_message(&self, msg: &BusMessage) -> Result<(), TransportError>;

    /// 关闭传输连接
    async fn close(&self) -> Result<(), TransportError>;

    /// 获取对端地址
    fn peer_addr(&self) -> Option<String> {
        None
    }
}

// ========== 辅助函数 ==========

/// 从异步流中读取一帧
pub(crate) async fn read_from_stream<R: AsyncReadExt + Unpin>(
    reader: &mut R,
) -> Result<BusMessage, TransportError> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(TransportError::Disconnected);
        }
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        return Err(TransportError::InvalidFrame(format!(
            "frame of {} bytes exceeds limit of {}",
            len, MAX_FRAME_LEN
        )));
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            TransportError::Disconnected
        } else {
            e.into()
        }
    })?;

    serde_json::from_slice(&body).map_err(|e| TransportError::InvalidFrame(e.to_string()))
}

/// 向异步流写入一帧
pub(crate) async fn write_to_stream<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    msg: &BusMessage,
) -> Result<(), TransportError> {
    let body = serde_json::to_vec(msg).map_err(|source| TransportError::Encode {
        topic: msg.topic.clone(),
        source,
    })?;
    if body.len() > MAX_FRAME_LEN {
        return Err(TransportError::InvalidFrame(format!(
            "frame of {} bytes exceeds limit of {}",
            body.len(),
            MAX_FRAME_LEN
        )));
    }

    let mut data = Vec::with_capacity(4 + body.len());
    data.extend_from_slice(&(body.len() as u32).to_le_bytes());
    data.extend_from_slice(&body);

    writer.write_all(&data).await?;
    writer.flush().await?;
    Ok(())
}
