//! 设备链路 TCP 服务器
//!
//! 负责处理键盘/自助终端设备连接，包括：
//! - 监听连接
//! - 协议握手验证 (版本号、订阅模式)
//! - 按订阅模式转发通道消息到设备：状态主题注册为可靠出站传输
//!   (重试 + 失败返回发布方)，其余主题由转发任务尽力投递
//! - 接收设备发布 (仅允许 `box/keypad`)

use std::net::SocketAddr;
use std::sync::Arc;

use shared::message::{
    BusMessage, EventType, HandshakePayload, PROTOCOL_VERSION, ResponsePayload, SyncPayload,
    topic,
};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::bus::{EventChannel, SinkFilter};
use super::transport::{TcpTransport, Transport};
use super::{ConnectedDevice, TransportError};

/// Delay before closing connection after sending error (allows device to receive the message)
const HANDSHAKE_ERROR_DELAY_MS: u64 = 100;

impl EventChannel {
    /// Start the device link listener
    ///
    /// Runs until the channel shuts down.
    pub async fn start_tcp_server(&self, addr: &str) -> Result<(), TransportError> {
        let listener = TcpListener::bind(addr).await?;
        tracing::info!("Device link listening on {}", addr);
        self.accept_loop(listener).await
    }

    /// Main accept loop
    pub async fn accept_loop(&self, listener: TcpListener) -> Result<(), TransportError> {
        loop {
            tokio::select! {
                _ = self.shutdown_token().cancelled() => {
                    tracing::info!("Device link shutting down");
                    break;
                }

                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            tracing::debug!("Device connected: {}", addr);
                            self.spawn_device_handler(stream, addr);
                        }
                        Err(e) => {
                            tracing::error!("Failed to accept connection: {}", e);
                        }
                    }
                }
            }
        }

        Ok(())
    }

    fn spawn_device_handler(&self, stream: TcpStream, addr: SocketAddr) {
        let channel = self.clone();
        let transport: Arc<dyn Transport> = Arc::new(TcpTransport::from_stream(stream));

        tokio::spawn(async move {
            if let Err(e) = channel.serve_device(transport).await {
                tracing::debug!("Device {} handler finished: {}", addr, e);
            }
        });
    }

    /// Serve one device over an established transport until it disconnects
    pub async fn serve_device(&self, transport: Arc<dyn Transport>) -> Result<(), TransportError> {
        let peer = transport
            .peer_addr()
            .unwrap_or_else(|| "unknown".to_string());

        let handshake = read_handshake(&transport, &peer).await?;
        let device_id = handshake
            .payload
            .device_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        // 先订阅再应答，设备收到应答后发布的消息不会丢失
        let rx = self.raw_receiver();
        let link_id = format!("device:{}:{}", device_id, Uuid::new_v4());
        self.register_transport(
            link_id.clone(),
            transport.clone(),
            SinkFilter {
                patterns: Some(handshake.payload.subscriptions.clone()),
                status_only: true,
            },
        );
        self.devices.insert(
            device_id.clone(),
            ConnectedDevice {
                id: device_id.clone(),
                name: handshake.payload.device_name.clone(),
                addr: transport.peer_addr(),
                subscriptions: handshake.payload.subscriptions.clone(),
            },
        );

        let response = BusMessage::response(&ResponsePayload::success(format!(
            "Connected as device: {}",
            device_id
        )))
        .map_err(|source| TransportError::Encode {
            topic: String::new(),
            source,
        })?;
        if let Err(e) = transport.write_message(&response).await {
            tracing::warn!("Failed to send handshake response: {}", e);
        }

        tracing::info!(
            device_id = %device_id,
            peer = %peer,
            subscriptions = ?handshake.payload.subscriptions,
            "Device registered"
        );

        let disconnect_token = CancellationToken::new();
        let forward_handle = spawn_channel_to_device_forwarder(
            transport.clone(),
            rx,
            handshake.payload.subscriptions,
            self.shutdown_token().clone(),
            device_id.clone(),
            disconnect_token.clone(),
        );

        self.read_device_messages(&transport, &device_id, disconnect_token.clone())
            .await;

        // Cleanup
        disconnect_token.cancel();
        self.deregister_transport(&link_id);
        let _ = forward_handle.await;
        let _ = transport.close().await;
        self.devices.remove(&device_id);
        tracing::debug!(device_id = %device_id, "Device removed from registry");

        Ok(())
    }

    /// Read frames from the device and publish the allowed ones
    async fn read_device_messages(
        &self,
        transport: &Arc<dyn Transport>,
        device_id: &str,
        disconnect_token: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = self.shutdown_token().cancelled() => break,
                _ = disconnect_token.cancelled() => break,

                read_result = transport.read_message() => {
                    match read_result {
                        Ok(mut msg) => {
                            if msg.event_type != EventType::Publish || msg.topic != topic::BOX_KEYPAD {
                                tracing::warn!(
                                    target: "security",
                                    device_id = %device_id,
                                    event_type = %msg.event_type,
                                    topic = %msg.topic,
                                    "Device attempted to publish outside box/keypad. Dropping message."
                                );
                                continue;
                            }

                            // Source tracking
                            msg.source = Some(device_id.to_string());
                            msg.published_at = shared::util::now_millis();

                            if let Err(e) = self.dispatch(msg).await {
                                tracing::warn!(device_id = %device_id, "Failed to publish device message: {}", e);
                            }
                        }
                        Err(TransportError::Disconnected) => {
                            tracing::debug!(device_id = %device_id, "Device disconnected");
                            break;
                        }
                        Err(e) => {
                            tracing::debug!(device_id = %device_id, "Device read error: {}", e);
                            break;
                        }
                    }
                }
            }
        }
    }
}

struct Handshake {
    payload: HandshakePayload,
}

/// Validate the first frame of a connection
async fn read_handshake(
    transport: &Arc<dyn Transport>,
    peer: &str,
) -> Result<Handshake, TransportError> {
    tracing::debug!("Waiting for handshake from {}", peer);

    let msg = transport.read_message().await.map_err(|e| {
        tracing::warn!("Device {} handshake error: {}", peer, e);
        e
    })?;

    if msg.event_type != EventType::Handshake {
        tracing::warn!(
            "Device {} failed to handshake: expected handshake, got {}",
            peer,
            msg.event_type
        );
        send_handshake_error(transport, "Expected handshake message").await;
        return Err(TransportError::InvalidFrame(
            "expected handshake message".to_string(),
        ));
    }

    let payload: HandshakePayload = match msg.parse_payload() {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!("Device {} sent invalid handshake payload: {}", peer, e);
            send_handshake_error(transport, &format!("Invalid handshake payload: {}", e)).await;
            return Err(TransportError::InvalidFrame(e.to_string()));
        }
    };

    if payload.version != PROTOCOL_VERSION {
        tracing::warn!(
            "Device {} protocol version mismatch: expected {}, got {}",
            peer,
            PROTOCOL_VERSION,
            payload.version
        );
        send_handshake_error(
            transport,
            &format!(
                "Protocol version mismatch: server={}, device={}",
                PROTOCOL_VERSION, payload.version
            ),
        )
        .await;
        return Err(TransportError::InvalidFrame(
            "protocol version mismatch".to_string(),
        ));
    }

    if let Some(bad) = payload
        .subscriptions
        .iter()
        .find(|pattern| !topic::is_valid_pattern(pattern))
    {
        tracing::warn!("Device {} sent invalid subscription pattern: {}", peer, bad);
        send_handshake_error(transport, &format!("Invalid topic pattern: {}", bad)).await;
        return Err(TransportError::InvalidPattern(bad.clone()));
    }

    Ok(Handshake { payload })
}

/// Send handshake error to device
async fn send_handshake_error(transport: &Arc<dyn Transport>, message: &str) {
    match BusMessage::response(&ResponsePayload::error(message, None)) {
        Ok(response) => {
            if let Err(e) = transport.write_message(&response).await {
                tracing::error!("Failed to send handshake error: {}", e);
            }
        }
        Err(e) => tracing::error!("Failed to encode handshake error: {}", e),
    }

    // Give device some time to receive the message before closing
    tokio::time::sleep(tokio::time::Duration::from_millis(HANDSHAKE_ERROR_DELAY_MS)).await;
}

/// Spawn task to forward matching channel messages to the device
fn spawn_channel_to_device_forwarder(
    transport: Arc<dyn Transport>,
    mut rx: broadcast::Receiver<BusMessage>,
    patterns: Vec<String>,
    shutdown_token: CancellationToken,
    device_id: String,
    disconnect_token: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown_token.cancelled() => {
                    tracing::debug!("Device {} forwarder shutting down", device_id);
                    break;
                }
                _ = disconnect_token.cancelled() => {
                    tracing::debug!(device_id = %device_id, "Device disconnected, forwarder stopping");
                    break;
                }
                msg_result = rx.recv() => {
                    match msg_result {
                        Ok(msg) => {
                            // 状态主题已经由可靠路径送达
                            if topic::is_status_topic(&msg.topic)
                                || !patterns.iter().any(|p| topic::matches(p, &msg.topic))
                            {
                                continue;
                            }
                            if let Err(e) = transport.write_message(&msg).await {
                                tracing::debug!(device_id = %device_id, "Device write failed: {}", e);
                                disconnect_token.cancel();
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            tracing::warn!(
                                device_id = %device_id,
                                dropped_messages = n,
                                "Device lagged behind, sending resync notification"
                            );

                            let resync = match BusMessage::sync(&SyncPayload::lagged(n)) {
                                Ok(msg) => msg.with_source("server"),
                                Err(e) => {
                                    tracing::error!("Failed to encode resync notification: {}", e);
                                    continue;
                                }
                            };
                            if let Err(e) = transport.write_message(&resync).await {
                                tracing::debug!(device_id = %device_id, "Failed to send resync notification: {}", e);
                                disconnect_token.cancel();
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            tracing::debug!(device_id = %device_id, "Broadcast channel closed");
                            break;
                        }
                    }
                }
            }
        }

        tracing::debug!(device_id = %device_id, "Device forwarder stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{ChannelConfig, MemoryTransport};
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn handshake(version: u16, subscriptions: &[&str]) -> BusMessage {
        BusMessage::handshake(&HandshakePayload {
            version,
            device_id: Some("keypad-1".to_string()),
            device_name: Some("Lobby keypad".to_string()),
            subscriptions: subscriptions.iter().map(|s| s.to_string()).collect(),
        })
        .unwrap()
    }

    /// 服务端一侧的链路，`fail_next` 次写入失败
    #[derive(Debug)]
    struct FlakyLink {
        inner: MemoryTransport,
        fail_next: AtomicU32,
    }

    #[async_trait::async_trait]
    impl Transport for FlakyLink {
        async fn read_message(&self) -> Result<BusMessage, TransportError> {
            self.inner.read_message().await
        }

        async fn write_message(&self, msg: &BusMessage) -> Result<(), TransportError> {
            let failing = self
                .fail_next
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failing {
                return Err(TransportError::Disconnected);
            }
            self.inner.write_message(msg).await
        }

        async fn close(&self) -> Result<(), TransportError> {
            self.inner.close().await
        }
    }

    fn connect_flaky(
        channel: &EventChannel,
    ) -> (MemoryTransport, Arc<FlakyLink>, tokio::task::JoinHandle<()>) {
        let (device, server_end) = MemoryTransport::pair();
        let link = Arc::new(FlakyLink {
            inner: server_end,
            fail_next: AtomicU32::new(0),
        });
        let channel = channel.clone();
        let served = link.clone();
        let handle = tokio::spawn(async move {
            let _ = channel.serve_device(served).await;
        });
        (device, link, handle)
    }

    fn connect(channel: &EventChannel) -> (MemoryTransport, tokio::task::JoinHandle<()>) {
        let (device, server_end) = MemoryTransport::pair();
        let channel = channel.clone();
        let handle = tokio::spawn(async move {
            let _ = channel.serve_device(Arc::new(server_end)).await;
        });
        (device, handle)
    }

    async fn read_response(device: &MemoryTransport) -> ResponsePayload {
        let msg = device.read_message().await.unwrap();
        assert_eq!(msg.event_type, EventType::Response);
        msg.parse_payload().unwrap()
    }

    #[tokio::test]
    async fn test_handshake_registers_and_forwards() {
        let channel = EventChannel::new();
        let (device, _handle) = connect(&channel);

        device
            .write_message(&handshake(PROTOCOL_VERSION, &["box/keypad/result"]))
            .await
            .unwrap();
        let response = read_response(&device).await;
        assert!(response.success);
        assert_eq!(channel.connected_devices().len(), 1);

        channel.publish("box/status", &json!({})).await.unwrap();
        channel
            .publish("box/keypad/result", &json!({"matched": false}))
            .await
            .unwrap();

        let forwarded = device.read_message().await.unwrap();
        assert_eq!(forwarded.topic, "box/keypad/result");
    }

    #[tokio::test]
    async fn test_version_mismatch_rejected() {
        let channel = EventChannel::new();
        let (device, handle) = connect(&channel);

        device.write_message(&handshake(99, &[])).await.unwrap();
        let response = read_response(&device).await;
        assert!(!response.success);

        handle.await.unwrap();
        assert!(channel.connected_devices().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_subscription_rejected() {
        let channel = EventChannel::new();
        let (device, handle) = connect(&channel);

        device
            .write_message(&handshake(PROTOCOL_VERSION, &["box/#/x"]))
            .await
            .unwrap();
        assert!(!read_response(&device).await.success);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_device_keypad_publish_reaches_channel() {
        let channel = EventChannel::new();
        let mut keypad = channel.subscribe("box/keypad").unwrap();
        let (device, _handle) = connect(&channel);

        device
            .write_message(&handshake(PROTOCOL_VERSION, &[]))
            .await
            .unwrap();
        read_response(&device).await;

        // 非 box/keypad 的发布被丢弃
        device
            .write_message(&BusMessage::publish("orders/x/status", json!("delivered")))
            .await
            .unwrap();
        device
            .write_message(&BusMessage::publish("box/keypad", json!({"code": "1234"})))
            .await
            .unwrap();

        let msg = keypad.recv().await.unwrap();
        assert_eq!(msg.source.as_deref(), Some("keypad-1"));
        assert_eq!(msg.payload, json!({"code": "1234"}));
    }

    #[tokio::test]
    async fn test_disconnect_unregisters_device() {
        let channel = EventChannel::new();
        let (device, handle) = connect(&channel);

        device
            .write_message(&handshake(PROTOCOL_VERSION, &["#"]))
            .await
            .unwrap();
        read_response(&device).await;
        assert_eq!(channel.connected_devices().len(), 1);

        device.close().await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(channel.connected_devices().is_empty());
    }

    #[tokio::test]
    async fn test_lagging_device_gets_resync() {
        let channel = EventChannel::from_config(ChannelConfig {
            capacity: 2,
            ..Default::default()
        });
        let (device, _handle) = connect(&channel);
        device
            .write_message(&handshake(PROTOCOL_VERSION, &["telemetry"]))
            .await
            .unwrap();
        read_response(&device).await;

        // 不让转发任务有机会运行，直接塞满缓冲区
        for n in 0..600 {
            channel.publish("telemetry", &json!({"n": n})).await.unwrap();
        }

        let mut saw_sync = false;
        for _ in 0..10 {
            let msg = tokio::time::timeout(Duration::from_secs(5), device.read_message())
                .await
                .unwrap()
                .unwrap();
            if msg.event_type == EventType::Sync {
                let payload: SyncPayload = msg.parse_payload().unwrap();
                assert!(payload.skipped > 0);
                saw_sync = true;
                break;
            }
        }
        assert!(saw_sync);
    }

    #[tokio::test]
    async fn test_tcp_link_end_to_end() {
        let channel = EventChannel::new();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = channel.clone();
        tokio::spawn(async move { server.accept_loop(listener).await });

        let device = TcpTransport::connect(&addr.to_string()).await.unwrap();
        device
            .write_message(&handshake(PROTOCOL_VERSION, &["box/status"]))
            .await
            .unwrap();
        let msg = device.read_message().await.unwrap();
        let response: ResponsePayload = msg.parse_payload().unwrap();
        assert!(response.success);

        channel.publish("box/status", &json!({"is_occupied": true})).await.unwrap();
        let forwarded = device.read_message().await.unwrap();
        assert_eq!(forwarded.topic, "box/status");

        channel.close();
    }

    #[tokio::test]
    async fn test_status_reaches_device_through_flaky_link() {
        let channel = EventChannel::from_config(ChannelConfig {
            retry_delay_ms: 5,
            ..Default::default()
        });
        let (device, link, _handle) = connect_flaky(&channel);
        device
            .write_message(&handshake(PROTOCOL_VERSION, &["orders/+/status"]))
            .await
            .unwrap();
        assert!(read_response(&device).await.success);

        link.fail_next.store(2, Ordering::SeqCst);
        channel
            .publish("orders/o1/status", &json!({"status": "ready"}))
            .await
            .unwrap();

        let msg = tokio::time::timeout(Duration::from_secs(5), device.read_message())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(msg.topic, "orders/o1/status");
        assert_eq!(msg.payload, json!({"status": "ready"}));
    }

    #[tokio::test]
    async fn test_dead_device_link_fails_status_publish() {
        let channel = EventChannel::from_config(ChannelConfig {
            max_retries: 2,
            retry_delay_ms: 5,
            ..Default::default()
        });
        let (device, link, _handle) = connect_flaky(&channel);
        device
            .write_message(&handshake(PROTOCOL_VERSION, &["box/status"]))
            .await
            .unwrap();
        read_response(&device).await;

        link.fail_next.store(u32::MAX, Ordering::SeqCst);
        let err = channel.publish("box/status", &json!({})).await.unwrap_err();
        assert!(matches!(
            err,
            TransportError::DeliveryFailed { attempts: 3, .. }
        ));

        // 未订阅的状态主题不受影响
        channel.publish("orders/o1/status", &json!({})).await.unwrap();
    }

    #[tokio::test]
    async fn test_status_topic_forwarded_once() {
        let channel = EventChannel::new();
        let (device, _handle) = connect(&channel);
        device
            .write_message(&handshake(PROTOCOL_VERSION, &["box/#"]))
            .await
            .unwrap();
        read_response(&device).await;

        channel.publish("box/status", &json!({"n": 1})).await.unwrap();
        channel
            .publish("box/keypad/result", &json!({"matched": true}))
            .await
            .unwrap();

        let first = device.read_message().await.unwrap();
        let second = device.read_message().await.unwrap();
        assert_eq!(first.topic, "box/status");
        assert_eq!(second.topic, "box/keypad/result");
    }

    #[tokio::test]
    async fn test_disconnect_deregisters_status_sink() {
        let channel = EventChannel::from_config(ChannelConfig {
            max_retries: 0,
            ..Default::default()
        });
        let (device, handle) = connect(&channel);
        device
            .write_message(&handshake(PROTOCOL_VERSION, &["box/status"]))
            .await
            .unwrap();
        read_response(&device).await;

        device.close().await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();

        channel.publish("box/status", &json!({})).await.unwrap();
    }
}
