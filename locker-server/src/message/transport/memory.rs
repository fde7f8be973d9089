//! Memory 传输层实现 (同进程通信)

use async_trait::async_trait;
use parking_lot::Mutex as SyncMutex;
use shared::message::BusMessage;
use tokio::sync::{Mutex, mpsc};

use super::Transport;
use crate::message::TransportError;

const MEMORY_LINK_CAPACITY: usize = 256;

/// In-process duplex link
///
/// 两端各持有一个 `MemoryTransport`，一端写入的消息由另一端读取。
/// 用于测试或进程内设备模拟。
#[derive(Debug)]
pub struct MemoryTransport {
    rx: Mutex<mpsc::Receiver<BusMessage>>,
    tx: SyncMutex<Option<mpsc::Sender<BusMessage>>>,
    name: String,
}

impl MemoryTransport {
    /// Create both ends of a link
    pub fn pair() -> (Self, Self) {
        let (a_tx, a_rx) = mpsc::channel(MEMORY_LINK_CAPACITY);
        let (b_tx, b_rx) = mpsc::channel(MEMORY_LINK_CAPACITY);
        (
            Self {
                rx: Mutex::new(b_rx),
                tx: SyncMutex::new(Some(a_tx)),
                name: "memory:a".to_string(),
            },
            Self {
                rx: Mutex::new(a_rx),
                tx: SyncMutex::new(Some(b_tx)),
                name: "memory:b".to_string(),
            },
        )
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn read_message(&self) -> Result<BusMessage, TransportError> {
        let mut rx = self.rx.lock().await;
        rx.recv().await.ok_or(TransportError::Disconnected)
    }

    async fn write_message(&self, msg: &BusMessage) -> Result<(), TransportError> {
        let tx = self.tx.lock().clone();
        match tx {
            Some(tx) => tx
                .send(msg.clone())
                .await
                .map_err(|_| TransportError::Disconnected),
            None => Err(TransportError::Closed),
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        // 释放发送端，对端读取将得到 Disconnected
        self.tx.lock().take();
        Ok(())
    }

    fn peer_addr(&self) -> Option<String> {
        Some(self.name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_pair_is_duplex() {
        let (a, b) = MemoryTransport::pair();

        a.write_message(&BusMessage::publish("box/keypad", json!("1234")))
            .await
            .unwrap();
        let got = b.read_message().await.unwrap();
        assert_eq!(got.topic, "box/keypad");

        b.write_message(&BusMessage::publish("box/status", json!({})))
            .await
            .unwrap();
        let got = a.read_message().await.unwrap();
        assert_eq!(got.topic, "box/status");
    }

    #[tokio::test]
    async fn test_close_disconnects_peer() {
        let (a, b) = MemoryTransport::pair();
        a.close().await.unwrap();

        assert!(matches!(
            b.read_message().await,
            Err(TransportError::Disconnected)
        ));
        assert!(matches!(
            a.write_message(&BusMessage::publish("t", json!(null))).await,
            Err(TransportError::Closed)
        ));
    }
}
