//! OrdersManager - 订单存储与状态机
//!
//! # 流程
//!
//! ```text
//! create / transition
//!     │  (per-order lock)
//!     ▼
//! redb write txn ── commit ──▶ publish orders/{id}/status (可靠)
//! ```
//!
//! 每次变更先持久化再发布；同一订单的状态事件在订单锁内发布，
//! 观察者看到的顺序即变更顺序。

mod error;

#[cfg(test)]
mod tests;

pub use crate::orders::money::ValidationError;
pub use error::{ManagerError, ManagerResult};

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use shared::message::{OrderCodeEvent, OrderStatusEvent, topic};
use shared::models::InventoryFlag;
use shared::order::{NewOrder, Order, OrderStatus};
use tokio::sync::Mutex;

use super::code;
use super::money::validate_order;
use super::storage::{OrderStorage, StorageStats};
use crate::message::EventChannel;

/// Order store
///
/// 订单的唯一所有者。锁顺序：创建锁 → 订单锁。
#[derive(Debug)]
pub struct OrdersManager {
    storage: OrderStorage,
    channel: EventChannel,
    /// Per-order mutation lock
    order_locks: DashMap<String, Arc<Mutex<()>>>,
    /// Serializes creation and reset
    create_lock: Mutex<()>,
}

impl OrdersManager {
    pub fn new(storage: OrderStorage, channel: EventChannel) -> Self {
        Self {
            storage,
            channel,
            order_locks: DashMap::new(),
            create_lock: Mutex::new(()),
        }
    }

    pub fn storage(&self) -> &OrderStorage {
        &self.storage
    }

    fn order_lock(&self, order_id: &str) -> Arc<Mutex<()>> {
        self.order_locks
            .entry(order_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    // ========== Commands ==========

    /// Checkout: validate, assign id and pickup code, persist in `pending`
    pub async fn create(&self, input: NewOrder) -> ManagerResult<Order> {
        let total = validate_order(&input)?;

        let create_guard = self.create_lock.lock().await;
        let order_id = shared::util::new_id();
        let order_lock = self.order_lock(&order_id);
        let _order_guard = order_lock.lock().await;

        let order = {
            let txn = self.storage.begin_write()?;
            let code = code::generate_unique(&mut rand::thread_rng(), |candidate| {
                self.storage.is_code_active_txn(&txn, candidate)
            })?
            .ok_or(ManagerError::CodeSpaceExhausted)?;

            let now = shared::util::now_millis();
            let order = Order {
                id: order_id,
                owner_id: input.owner_id,
                items: input.items,
                total,
                status: OrderStatus::Pending,
                code,
                created_at: now,
                updated_at: now,
                customer_details: input.customer_details,
            };

            self.storage.store_order(&txn, &order)?;
            self.storage.claim_code(&txn, &order.code, &order.id)?;
            self.storage.commit(txn)?;
            order
        };
        drop(create_guard);

        tracing::info!(
            order_id = %order.id,
            owner_id = %order.owner_id,
            total = order.total,
            items = order.items.len(),
            "Order created"
        );

        self.channel
            .publish(
                &topic::order_code(&order.id),
                &OrderCodeEvent {
                    order_id: order.id.clone(),
                    code: order.code.clone(),
                },
            )
            .await?;
        self.publish_status(&order, None).await?;

        Ok(order)
    }

    /// Apply one edge of the lifecycle graph
    pub async fn transition(&self, order_id: &str, target: OrderStatus) -> ManagerResult<Order> {
        let order_lock = self.order_lock(order_id);
        let _guard = order_lock.lock().await;

        let (order, previous) = {
            let txn = self.storage.begin_write()?;
            let mut order = self
                .storage
                .get_order_txn(&txn, order_id)?
                .ok_or_else(|| ManagerError::OrderNotFound(order_id.to_string()))?;

            let previous = order.status;
            if !previous.can_transition_to(target) {
                return Err(ManagerError::InvalidTransition {
                    order_id: order_id.to_string(),
                    from: previous,
                    to: target,
                });
            }

            order.status = target;
            order.updated_at = shared::util::now_millis();
            self.storage.store_order(&txn, &order)?;
            if target.is_terminal() {
                self.storage.release_code(&txn, &order.code, &order.id)?;
            }
            self.storage.commit(txn)?;
            (order, previous)
        };

        tracing::info!(
            order_id = %order.id,
            from = %previous,
            to = %target,
            "Order status changed"
        );

        let published = self.publish_status(&order, Some(previous)).await;
        if target.is_terminal() {
            // 终态后不再有合法变更
            self.order_locks.remove(order_id);
        }
        published?;

        Ok(order)
    }

    /// Administrative bulk clear; returns the number of orders removed
    pub async fn reset_all(&self) -> ManagerResult<u64> {
        let _create_guard = self.create_lock.lock().await;

        let txn = self.storage.begin_write()?;
        let removed = self.storage.clear_orders(&txn)?;
        self.storage.commit(txn)?;

        self.order_locks.clear();
        tracing::warn!(removed = removed, "All orders cleared");
        Ok(removed)
    }

    async fn publish_status(
        &self,
        order: &Order,
        previous: Option<OrderStatus>,
    ) -> ManagerResult<()> {
        let event = OrderStatusEvent {
            order_id: order.id.clone(),
            status: order.status,
            previous,
            updated_at: order.updated_at,
        };
        self.channel
            .publish(&topic::order_status(&order.id), &event)
            .await?;
        Ok(())
    }

    // ========== Queries ==========

    pub fn get(&self, order_id: &str) -> ManagerResult<Order> {
        self.storage
            .get_order(order_id)?
            .ok_or_else(|| ManagerError::OrderNotFound(order_id.to_string()))
    }

    /// Orders of one customer, newest first
    pub fn list_by_owner(&self, owner_id: &str) -> ManagerResult<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .storage
            .get_all_orders()?
            .into_iter()
            .filter(|o| o.owner_id == owner_id)
            .collect();
        sort_newest_first(&mut orders);
        Ok(orders)
    }

    /// Every order, newest first; `filter` matches id, code or owner (case-insensitive)
    pub fn list_all(&self, filter: Option<&str>) -> ManagerResult<Vec<Order>> {
        let filter = filter.map(str::trim).filter(|q| !q.is_empty());
        let mut orders: Vec<Order> = self
            .storage
            .get_all_orders()?
            .into_iter()
            .filter(|o| filter.is_none_or(|q| o.matches_query(q)))
            .collect();
        sort_newest_first(&mut orders);
        Ok(orders)
    }

    /// Orders in a non-terminal state, oldest first
    pub fn active_orders(&self) -> ManagerResult<Vec<Order>> {
        let mut orders = self.storage.get_active_orders()?;
        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(orders)
    }

    pub fn stats(&self) -> ManagerResult<StorageStats> {
        Ok(self.storage.get_stats()?)
    }

    // ========== Inventory ==========

    /// Persist a product flag and publish `inventory/{product_id}`
    pub async fn set_availability(
        &self,
        product_id: &str,
        available: bool,
    ) -> ManagerResult<InventoryFlag> {
        self.storage.set_inventory(product_id, available)?;
        let flag = InventoryFlag {
            product_id: product_id.to_string(),
            available,
        };
        tracing::info!(product_id = %product_id, available = available, "Inventory updated");
        self.channel
            .publish(&topic::inventory(product_id), &flag)
            .await?;
        Ok(flag)
    }

    pub fn inventory(&self) -> ManagerResult<BTreeMap<String, bool>> {
        Ok(self.storage.get_inventory()?)
    }

    pub fn is_available(&self, product_id: &str) -> ManagerResult<bool> {
        Ok(self.storage.is_available(product_id)?)
    }
}

fn sort_newest_first(orders: &mut [Order]) {
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
}
