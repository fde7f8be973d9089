//! Prep Worker - 模拟厨房出餐
//!
//! 监听 `orders/+/code`，每个新订单等待出餐时间后调用
//! `BoxCoordinator::mark_ready`。期间被取消的订单直接跳过。
//! 订阅落后丢失事件时，重新扫描仍在厨房 (pending / paid) 的订单。

use std::sync::Arc;
use std::time::Duration;

use shared::message::{BusMessage, OrderCodeEvent, topic};
use shared::order::OrderStatus;
use tokio_util::sync::CancellationToken;

use super::OrdersManager;
use crate::locker::BoxCoordinator;
use crate::message::{EventChannel, Subscription, SubscriptionError, TransportError};

pub struct PrepWorker {
    subscription: Subscription,
    orders: Arc<OrdersManager>,
    coordinator: Arc<BoxCoordinator>,
    delay: Duration,
    shutdown_token: CancellationToken,
}

impl PrepWorker {
    pub fn new(
        channel: &EventChannel,
        orders: Arc<OrdersManager>,
        coordinator: Arc<BoxCoordinator>,
        delay: Duration,
        shutdown_token: CancellationToken,
    ) -> Result<Self, TransportError> {
        Ok(Self {
            subscription: channel.subscribe(topic::ORDER_CODE_PATTERN)?,
            orders,
            coordinator,
            delay,
            shutdown_token,
        })
    }

    pub async fn run(mut self) {
        tracing::info!(delay_ms = self.delay.as_millis() as u64, "Prep worker started");

        loop {
            tokio::select! {
                _ = self.shutdown_token.cancelled() => {
                    tracing::info!("Prep worker shutting down");
                    break;
                }

                msg_result = self.subscription.recv() => {
                    match msg_result {
                        Ok(msg) => self.schedule(&msg),
                        Err(SubscriptionError::Lagged(skipped)) => {
                            tracing::warn!("Prep worker lagged, skipped {} events", skipped);
                            self.rescan();
                        }
                        Err(SubscriptionError::Closed) => {
                            tracing::info!("Event channel closed");
                            break;
                        }
                    }
                }
            }
        }

        tracing::info!("Prep worker stopped");
    }

    fn schedule(&self, msg: &BusMessage) {
        let event: OrderCodeEvent = match msg.parse_payload() {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(topic = %msg.topic, error = %e, "Ignoring malformed code event");
                return;
            }
        };

        self.schedule_order(event.order_id);
    }

    /// Reschedule every order still in the kitchen
    fn rescan(&self) {
        let kitchen: Vec<String> = match self.orders.active_orders() {
            Ok(orders) => orders
                .into_iter()
                .filter(|o| matches!(o.status, OrderStatus::Pending | OrderStatus::Paid))
                .map(|o| o.id)
                .collect(),
            Err(e) => {
                tracing::error!(error = %e, "Prep rescan failed");
                return;
            }
        };

        tracing::info!(count = kitchen.len(), "Rescheduling orders after lag");
        for order_id in kitchen {
            self.schedule_order(order_id);
        }
    }

    fn schedule_order(&self, order_id: String) {
        let orders = self.orders.clone();
        let coordinator = self.coordinator.clone();
        let shutdown = self.shutdown_token.clone();
        let delay = self.delay;

        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
            prepare(&orders, &coordinator, &order_id).await;
        });
    }
}

/// Finish one order; returns whether it was handed to the box
pub async fn prepare(orders: &OrdersManager, coordinator: &BoxCoordinator, order_id: &str) -> bool {
    match orders.get(order_id) {
        Ok(order) if matches!(order.status, OrderStatus::Pending | OrderStatus::Paid) => {}
        Ok(order) => {
            tracing::debug!(order_id = %order_id, status = %order.status, "Order no longer in the kitchen, skipping");
            return false;
        }
        Err(e) => {
            tracing::warn!(order_id = %order_id, error = %e, "Prep lookup failed");
            return false;
        }
    }

    match coordinator.mark_ready(order_id).await {
        Ok((_, placement)) => {
            tracing::info!(order_id = %order_id, placement = ?placement, "Order prepared");
            true
        }
        Err(e) => {
            tracing::warn!(order_id = %order_id, error = %e, "Failed to mark order ready");
            false
        }
    }
}
