//! Keypad listener
//!
//! Subscribes to `box/keypad` and feeds every entered code to the box
//! coordinator. Bad payloads and wrong codes are logged, never fatal.

use std::sync::Arc;

use serde_json::Value;
use shared::message::{BusMessage, topic};
use tokio_util::sync::CancellationToken;

use super::{EventChannel, Subscription, SubscriptionError, TransportError};
use crate::locker::BoxCoordinator;

pub struct KeypadListener {
    subscription: Subscription,
    coordinator: Arc<BoxCoordinator>,
    shutdown_token: CancellationToken,
}

impl KeypadListener {
    pub fn new(
        channel: &EventChannel,
        coordinator: Arc<BoxCoordinator>,
        shutdown_token: CancellationToken,
    ) -> Result<Self, TransportError> {
        Ok(Self {
            subscription: channel.subscribe(topic::BOX_KEYPAD)?,
            coordinator,
            shutdown_token,
        })
    }

    /// Start processing keypad input
    ///
    /// Long-running; spawn it as a background task.
    pub async fn run(mut self) {
        tracing::info!("Keypad listener started");

        loop {
            tokio::select! {
                _ = self.shutdown_token.cancelled() => {
                    tracing::info!("Keypad listener shutting down");
                    break;
                }

                msg_result = self.subscription.recv() => {
                    match msg_result {
                        Ok(msg) => self.handle_message(&msg).await,
                        Err(SubscriptionError::Lagged(skipped)) => {
                            tracing::warn!("Keypad listener lagged, skipped {} messages", skipped);
                        }
                        Err(SubscriptionError::Closed) => {
                            tracing::info!("Event channel closed");
                            break;
                        }
                    }
                }
            }
        }

        tracing::info!("Keypad listener stopped");
    }

    async fn handle_message(&self, msg: &BusMessage) {
        let Some(code) = parse_keypad_code(&msg.payload) else {
            tracing::warn!(
                source = ?msg.source,
                payload = %msg.payload,
                "Ignoring malformed keypad payload"
            );
            return;
        };

        match self.coordinator.submit_code(&code).await {
            Ok(true) => tracing::info!(source = ?msg.source, "Keypad code accepted"),
            Ok(false) => tracing::info!(source = ?msg.source, "Keypad code rejected"),
            Err(e) => tracing::error!(source = ?msg.source, error = %e, "Keypad submission failed"),
        }
    }
}

/// Accepts `{"code": "1234"}` or a bare `"1234"`
pub fn parse_keypad_code(payload: &Value) -> Option<String> {
    let raw = match payload {
        Value::String(s) => s.as_str(),
        Value::Object(map) => map.get("code")?.as_str()?,
        _ => return None,
    };
    let code = raw.trim();
    if code.is_empty() {
        None
    } else {
        Some(code.to_string())
    }
}
