//! 主题订阅
//!
//! 每个订阅者在广播环形缓冲区中拥有独立游标：不回放订阅之前的历史，
//! 落后太多时丢弃最旧的消息并告知跳过数量，之后继续接收。

use futures::Stream;
use shared::message::{BusMessage, topic};
use thiserror::Error;
use tokio::sync::broadcast;

/// 订阅接收错误
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubscriptionError {
    /// 订阅者落后，跳过了 n 条消息 (订阅仍然有效)
    #[error("Subscriber lagged behind, skipped {0} messages")]
    Lagged(u64),
    /// 通道已关闭
    #[error("Event channel closed")]
    Closed,
}

/// A live subscription to one topic pattern
#[derive(Debug)]
pub struct Subscription {
    pattern: String,
    rx: broadcast::Receiver<BusMessage>,
}

impl Subscription {
    pub(crate) fn new(pattern: String, rx: broadcast::Receiver<BusMessage>) -> Self {
        Self { pattern, rx }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// 接收下一条匹配的消息
    pub async fn recv(&mut self) -> Result<BusMessage, SubscriptionError> {
        loop {
            match self.rx.recv().await {
                Ok(msg) if topic::matches(&self.pattern, &msg.topic) => return Ok(msg),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    return Err(SubscriptionError::Lagged(n));
                }
                Err(broadcast::error::RecvError::Closed) => return Err(SubscriptionError::Closed),
            }
        }
    }

    /// New subscription with the same pattern, positioned at the live head
    pub fn resubscribe(&self) -> Self {
        Self {
            pattern: self.pattern.clone(),
            rx: self.rx.resubscribe(),
        }
    }

    /// Lazy stream view; ends when the channel closes.
    /// Lag notices are yielded as `Err(Lagged(n))` and the stream continues.
    pub fn into_stream(self) -> impl Stream<Item = Result<BusMessage, SubscriptionError>> {
        futures::stream::unfold(self, |mut sub| async move {
            match sub.recv().await {
                Err(SubscriptionError::Closed) => None,
                item => Some((item, sub)),
            }
        })
    }
}
