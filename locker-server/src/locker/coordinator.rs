//! BoxCoordinator - 预留、取餐码校验与释放
//!
//! `reserve` / `release` / `submit_code` / `mark_ready` / `cancel` 都在同一把
//! 协调锁内执行。锁顺序：协调锁 → 订单锁 (通过 `OrdersManager::transition`)，
//! 管理员重置为协调锁 → 创建锁。

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::RwLock;
use shared::message::topic;
use shared::models::{BoxStatus, KeypadResult};
use shared::order::{Order, OrderStatus};
use tokio::sync::Mutex;

use super::error::{LockerError, LockerResult};
use crate::message::{EventChannel, TransportError};
use crate::orders::OrdersManager;
use crate::orders::manager::ManagerError;

#[derive(Debug, Clone)]
struct Reservation {
    order_id: String,
    user_id: String,
    code: String,
}

impl From<&Order> for Reservation {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.id.clone(),
            user_id: order.owner_id.clone(),
            code: order.code.clone(),
        }
    }
}

#[derive(Debug, Default)]
struct BoxSlot {
    reserved: Option<Reservation>,
    /// 等待储物柜的就绪订单
    queue: VecDeque<String>,
}

impl BoxSlot {
    fn status(&self) -> BoxStatus {
        BoxStatus {
            is_occupied: self.reserved.is_some(),
            reserved_for_user_id: self.reserved.as_ref().map(|r| r.user_id.clone()),
            waiting: self.queue.len(),
        }
    }

    fn holder(&self) -> Option<&str> {
        self.reserved.as_ref().map(|r| r.order_id.as_str())
    }
}

/// Where `mark_ready` put the order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// The order now holds the box
    Reserved,
    /// Box busy; 1-based position in the wait queue
    Queued(usize),
}

#[derive(Debug)]
pub struct BoxCoordinator {
    orders: Arc<OrdersManager>,
    channel: EventChannel,
    slot: Mutex<BoxSlot>,
    /// Lock-free read projection of the slot
    snapshot: RwLock<BoxStatus>,
}

impl BoxCoordinator {
    pub fn new(orders: Arc<OrdersManager>, channel: EventChannel) -> Self {
        Self {
            orders,
            channel,
            slot: Mutex::new(BoxSlot::default()),
            snapshot: RwLock::new(BoxStatus::default()),
        }
    }

    /// Read-only projection
    pub fn status(&self) -> BoxStatus {
        self.snapshot.read().clone()
    }

    /// Reserve the box for a ready order
    ///
    /// Idempotent for the current holder; `BoxBusy` for anyone else.
    pub async fn reserve(&self, order_id: &str) -> LockerResult<BoxStatus> {
        let mut slot = self.slot.lock().await;
        let changed = self.reserve_locked(&mut slot, order_id)?;
        if changed {
            self.publish_status(&slot).await?;
        }
        Ok(slot.status())
    }

    /// Compare a keypad entry with the reserved order's code
    ///
    /// On a match the order is delivered and the box released. Every attempt's
    /// outcome is published on `box/keypad/result`.
    pub async fn submit_code(&self, code: &str) -> LockerResult<bool> {
        let mut slot = self.slot.lock().await;

        let candidate = match &slot.reserved {
            Some(reservation) if reservation.code == code => reservation.order_id.clone(),
            _ => {
                tracing::info!(occupied = slot.reserved.is_some(), "Keypad code did not match");
                self.publish_keypad_result(false, None).await?;
                return Ok(false);
            }
        };

        let deferred = match self
            .transition_committed(&candidate, OrderStatus::Delivered)
            .await
        {
            Ok((_, deferred)) => deferred,
            Err(LockerError::Order(
                ManagerError::InvalidTransition { .. } | ManagerError::OrderNotFound(_),
            )) => {
                // 预留指向的订单已不可交付 (例如被重置)，清掉失效预留
                tracing::warn!(order_id = %candidate, "Dropping stale reservation");
                slot.reserved = None;
                self.promote_next(&mut slot);
                self.publish_status(&slot).await?;
                self.publish_keypad_result(false, None).await?;
                return Ok(false);
            }
            Err(e) => return Err(e),
        };

        slot.reserved = None;
        tracing::info!(order_id = %candidate, "Code matched, order delivered and box released");
        self.promote_next(&mut slot);
        self.publish_status(&slot).await?;
        self.publish_keypad_result(true, Some(candidate)).await?;

        match deferred {
            Some(e) => Err(e.into()),
            None => Ok(true),
        }
    }

    /// Clear the reservation (idempotent) and hand the box to the next waiter
    pub async fn release(&self) -> LockerResult<BoxStatus> {
        let mut slot = self.slot.lock().await;
        if let Some(reservation) = slot.reserved.take() {
            tracing::info!(order_id = %reservation.order_id, "Box released");
            self.promote_next(&mut slot);
            self.publish_status(&slot).await?;
        }
        Ok(slot.status())
    }

    /// Kitchen completion: move the order to `ready`, then reserve or queue it
    pub async fn mark_ready(&self, order_id: &str) -> LockerResult<(Order, Placement)> {
        let mut slot = self.slot.lock().await;
        let (order, deferred) = self
            .transition_committed(order_id, OrderStatus::Ready)
            .await?;

        let placement = match self.reserve_locked(&mut slot, order_id) {
            Ok(_) => Placement::Reserved,
            Err(LockerError::BoxBusy { holder }) => {
                if !slot.queue.iter().any(|id| id == order_id) {
                    slot.queue.push_back(order_id.to_string());
                }
                let position = slot
                    .queue
                    .iter()
                    .position(|id| id == order_id)
                    .map_or(slot.queue.len(), |p| p + 1);
                tracing::info!(
                    order_id = %order_id,
                    holder = %holder,
                    position = position,
                    "Box busy, order queued"
                );
                Placement::Queued(position)
            }
            Err(e) => return Err(e),
        };
        self.publish_status(&slot).await?;

        match deferred {
            Some(e) => Err(e.into()),
            None => Ok((order, placement)),
        }
    }

    /// Operator cancel; frees the box when the order held it
    pub async fn cancel(&self, order_id: &str) -> LockerResult<Order> {
        let mut slot = self.slot.lock().await;
        let (order, deferred) = self
            .transition_committed(order_id, OrderStatus::Cancelled)
            .await?;

        let queued_before = slot.queue.len();
        slot.queue.retain(|id| id != order_id);
        let mut changed = slot.queue.len() != queued_before;

        if slot.holder() == Some(order_id) {
            slot.reserved = None;
            tracing::info!(order_id = %order_id, "Reserved order cancelled, box released");
            self.promote_next(&mut slot);
            changed = true;
        }
        if changed {
            self.publish_status(&slot).await?;
        }

        match deferred {
            Some(e) => Err(e.into()),
            None => Ok(order),
        }
    }

    /// Administrative reset: remove every order, then drop the reservation and
    /// the wait queue
    ///
    /// Both steps run under the coordinator lock; returns the number of orders removed.
    pub async fn reset_all(&self) -> LockerResult<u64> {
        let mut slot = self.slot.lock().await;
        let removed = self.orders.reset_all().await?;
        *slot = BoxSlot::default();
        self.publish_status(&slot).await?;
        Ok(removed)
    }

    // ========== Internals (协调锁内调用) ==========

    /// Returns whether the slot changed
    fn reserve_locked(&self, slot: &mut BoxSlot, order_id: &str) -> LockerResult<bool> {
        match slot.holder() {
            Some(holder) if holder == order_id => return Ok(false),
            Some(holder) => {
                return Err(LockerError::BoxBusy {
                    holder: holder.to_string(),
                });
            }
            None => {}
        }

        let order = self.orders.get(order_id)?;
        if order.status != OrderStatus::Ready {
            return Err(LockerError::NotReady {
                order_id: order_id.to_string(),
                status: order.status,
            });
        }

        slot.reserved = Some(Reservation::from(&order));
        slot.queue.retain(|id| id != order_id);
        tracing::info!(order_id = %order_id, user_id = %order.owner_id, "Box reserved");
        Ok(true)
    }

    /// Reserve for the first queued order that is still ready; stale entries are dropped
    fn promote_next(&self, slot: &mut BoxSlot) {
        while slot.reserved.is_none() {
            let Some(next) = slot.queue.pop_front() else {
                break;
            };
            match self.orders.get(&next) {
                Ok(order) if order.status == OrderStatus::Ready => {
                    tracing::info!(order_id = %next, "Box handed to next waiting order");
                    slot.reserved = Some(Reservation::from(&order));
                }
                Ok(order) => {
                    tracing::debug!(order_id = %next, status = %order.status, "Skipping stale queue entry");
                }
                Err(e) => {
                    tracing::warn!(order_id = %next, error = %e, "Skipping unreadable queue entry");
                }
            }
        }
    }

    /// Run a transition; a publish failure after commit is returned separately
    /// so the box state can still follow the committed order state.
    async fn transition_committed(
        &self,
        order_id: &str,
        target: OrderStatus,
    ) -> LockerResult<(Order, Option<TransportError>)> {
        match self.orders.transition(order_id, target).await {
            Ok(order) => Ok((order, None)),
            Err(ManagerError::Transport(e)) => {
                let order = self.orders.get(order_id)?;
                if order.status == target {
                    Ok((order, Some(e)))
                } else {
                    Err(ManagerError::Transport(e).into())
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn publish_status(&self, slot: &BoxSlot) -> LockerResult<()> {
        let status = slot.status();
        *self.snapshot.write() = status.clone();
        self.channel.publish(topic::BOX_STATUS, &status).await?;
        Ok(())
    }

    async fn publish_keypad_result(&self, matched: bool, order_id: Option<String>) -> LockerResult<()> {
        self.channel
            .publish(topic::BOX_KEYPAD_RESULT, &KeypadResult { matched, order_id })
            .await?;
        Ok(())
    }
}
