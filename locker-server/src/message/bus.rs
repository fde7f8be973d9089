//! 事件通道核心实现
//!
//! # 架构
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                     EventChannel                        │
//! │  ┌───────────────────────────────────────────────────┐  │
//! │  │  broadcast::Sender<BusMessage>  (进程内订阅者)     │  │
//! │  └───────────────────────────────────────────────────┘  │
//! │  ┌───────────────────────────────────────────────────┐  │
//! │  │  Vec<Sink>  (外部出站传输 + 主题过滤)              │  │
//! │  └───────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! # 投递语义
//!
//! - 进程内订阅者：发布者从不阻塞，慢订阅者丢弃最旧消息
//! - 外部传输：状态主题 (`orders/{id}/status`, `box/status`) 走可靠路径，
//!   指数退避重试，耗尽后向调用方返回 [`TransportError`]；其余主题尽力而为
//! - 设备链路以 `status_only` 过滤注册：状态主题经此可靠路径送达设备，
//!   其余主题由设备转发任务投递

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::RwLock;
use serde::Serialize;
use shared::message::{BusMessage, topic};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use super::subscription::Subscription;
use super::transport::Transport;
use super::{ConnectedDevice, TransportError};

/// Event channel tuning
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// 每个订阅者的缓冲上限
    pub capacity: usize,
    /// 可靠投递在首次失败后的重试次数
    pub max_retries: u32,
    /// 退避基准延迟 (毫秒)
    pub retry_delay_ms: u64,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            max_retries: 3,
            retry_delay_ms: 100,
        }
    }
}

/// 出站传输的主题过滤
#[derive(Debug, Clone, Default)]
pub struct SinkFilter {
    /// 主题模式；`None` 接收全部主题
    pub patterns: Option<Vec<String>>,
    /// 只接收状态主题
    pub status_only: bool,
}

impl SinkFilter {
    fn accepts(&self, topic_name: &str) -> bool {
        if self.status_only && !topic::is_status_topic(topic_name) {
            return false;
        }
        match &self.patterns {
            Some(patterns) => patterns.iter().any(|p| topic::matches(p, topic_name)),
            None => true,
        }
    }
}

#[derive(Debug, Clone)]
struct Sink {
    id: String,
    transport: Arc<dyn Transport>,
    filter: SinkFilter,
}

/// 事件通道 - 负责主题发布与订阅
///
/// # 职责
///
/// - 主题发布 (publish, dispatch)
/// - 模式订阅 (subscribe)
/// - 外部传输管理 (register_transport)
/// - 设备登记 (connected_devices)
#[derive(Debug, Clone)]
pub struct EventChannel {
    tx: broadcast::Sender<BusMessage>,
    sinks: Arc<RwLock<Vec<Sink>>>,
    config: ChannelConfig,
    shutdown_token: CancellationToken,
    pub(crate) devices: Arc<DashMap<String, ConnectedDevice>>,
}

impl EventChannel {
    /// 创建默认配置的事件通道
    pub fn new() -> Self {
        Self::from_config(ChannelConfig::default())
    }

    pub fn from_config(config: ChannelConfig) -> Self {
        let (tx, _) = broadcast::channel(config.capacity.max(1));
        Self {
            tx,
            sinks: Arc::new(RwLock::new(Vec::new())),
            config,
            shutdown_token: CancellationToken::new(),
            devices: Arc::new(DashMap::new()),
        }
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// 序列化载荷并发布到主题
    pub async fn publish<T: Serialize + ?Sized>(
        &self,
        topic: &str,
        payload: &T,
    ) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        let payload = serde_json::to_value(payload).map_err(|source| TransportError::Encode {
            topic: topic.to_string(),
            source,
        })?;
        self.dispatch(BusMessage::publish(topic, payload)).await
    }

    /// 投递一条已构造的消息
    ///
    /// 进程内订阅者恰好收到一次；没有订阅者不是错误。
    pub async fn dispatch(&self, msg: BusMessage) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }

        let _ = self.tx.send(msg.clone());

        let sinks: Vec<Sink> = self
            .sinks
            .read()
            .iter()
            .filter(|sink| sink.filter.accepts(&msg.topic))
            .cloned()
            .collect();
        if sinks.is_empty() {
            return Ok(());
        }

        let reliable = topic::is_status_topic(&msg.topic);
        let mut first_error = None;
        for sink in &sinks {
            if reliable {
                if let Err(e) = self.deliver_with_retry(&sink.transport, &msg).await {
                    first_error.get_or_insert(e);
                }
            } else if let Err(e) = sink.transport.write_message(&msg).await {
                tracing::warn!(
                    topic = %msg.topic,
                    sink = %sink.id,
                    error = %e,
                    "Best-effort delivery failed"
                );
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// 可靠投递：指数退避 `base * 2^(retry-1)`
    async fn deliver_with_retry(
        &self,
        sink: &Arc<dyn Transport>,
        msg: &BusMessage,
    ) -> Result<(), TransportError> {
        let max_retries = self.config.max_retries;
        let base_delay = self.config.retry_delay_ms;
        let mut retry_count: u32 = 0;

        loop {
            match sink.write_message(msg).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    retry_count += 1;
                    if retry_count > max_retries {
                        tracing::error!(
                            topic = %msg.topic,
                            peer = ?sink.peer_addr(),
                            attempts = retry_count,
                            error = %e,
                            "Reliable delivery exhausted retries"
                        );
                        return Err(TransportError::DeliveryFailed {
                            topic: msg.topic.clone(),
                            attempts: retry_count,
                            reason: e.to_string(),
                        });
                    }

                    let delay = base_delay.saturating_mul(2_u64.saturating_pow(retry_count - 1));
                    tracing::warn!(
                        topic = %msg.topic,
                        retry_count = %retry_count,
                        delay_ms = %delay,
                        error = %e,
                        "Delivery failed, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                }
            }
        }
    }

    /// 订阅主题模式 (`+` 单层, `#` 末尾多层)
    pub fn subscribe(&self, pattern: &str) -> Result<Subscription, TransportError> {
        if !topic::is_valid_pattern(pattern) {
            return Err(TransportError::InvalidPattern(pattern.to_string()));
        }
        Ok(Subscription::new(pattern.to_string(), self.tx.subscribe()))
    }

    /// 原始广播接收端 (设备转发使用，自行按模式过滤)
    pub(crate) fn raw_receiver(&self) -> broadcast::Receiver<BusMessage> {
        self.tx.subscribe()
    }

    /// 注册外部出站传输；相同 `id` 覆盖旧的注册
    pub fn register_transport(
        &self,
        id: impl Into<String>,
        transport: Arc<dyn Transport>,
        filter: SinkFilter,
    ) {
        let id = id.into();
        tracing::debug!(sink = %id, peer = ?transport.peer_addr(), "Transport registered");
        let mut sinks = self.sinks.write();
        sinks.retain(|sink| sink.id != id);
        sinks.push(Sink {
            id,
            transport,
            filter,
        });
    }

    /// 移除出站传输，返回是否存在
    pub fn deregister_transport(&self, id: &str) -> bool {
        let mut sinks = self.sinks.write();
        let before = sinks.len();
        sinks.retain(|sink| sink.id != id);
        before != sinks.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// 获取已连接设备列表
    pub fn connected_devices(&self) -> Vec<ConnectedDevice> {
        self.devices
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// 获取关闭令牌 (用于监控关闭信号)
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown_token
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown_token.is_cancelled()
    }

    /// 关闭事件通道
    ///
    /// 之后的发布返回 [`TransportError::Closed`]，设备链路随之停止。
    pub fn close(&self) {
        tracing::info!("Shutting down event channel");
        self.shutdown_token.cancel();
    }
}

impl Default for EventChannel {
    fn default() -> Self {
        Self::new()
    }
}
