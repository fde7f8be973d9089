//! Admin API Handlers

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use shared::error::ErrorCode;
use shared::models::{BoxStatus, InventoryFlag, InventoryUpdate};
use shared::order::{Order, OrderStatus};

use crate::core::ServerState;
use crate::message::ConnectedDevice;
use crate::orders::StorageStats;
use crate::utils::{AppError, AppResult};

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub removed: u64,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: OrderStatus,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub storage: StorageStats,
    #[serde(rename = "box")]
    pub box_status: BoxStatus,
    pub devices: Vec<ConnectedDevice>,
    pub subscribers: usize,
}

/// Drop every order, the reservation and the wait queue
pub async fn reset(State(state): State<ServerState>) -> AppResult<Json<ResetResponse>> {
    let removed = state.reset_all().await?;
    Ok(Json(ResetResponse { removed }))
}

pub async fn set_inventory(
    State(state): State<ServerState>,
    Path(product_id): Path<String>,
    Json(update): Json<InventoryUpdate>,
) -> AppResult<Json<InventoryFlag>> {
    let product_id = product_id.trim();
    if product_id.is_empty() {
        return Err(AppError::with_message(
            ErrorCode::InvalidProduct,
            "Product id must not be empty",
        ));
    }
    let flag = state
        .orders
        .set_availability(product_id, update.available)
        .await?;
    Ok(Json(flag))
}

pub async fn search_orders(
    State(state): State<ServerState>,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<Vec<Order>>> {
    let orders = state.orders.list_all(query.q.as_deref())?;
    Ok(Json(orders))
}

/// Operator transition
///
/// `ready` goes through the box coordinator so the order is reserved or
/// queued; `cancelled` frees the box when the order held it. `delivered`
/// only happens at the keypad.
pub async fn update_status(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(update): Json<StatusUpdate>,
) -> AppResult<Json<Order>> {
    let order = match update.status {
        OrderStatus::Paid => state.orders.transition(&id, OrderStatus::Paid).await?,
        OrderStatus::Ready => state.coordinator.mark_ready(&id).await?.0,
        OrderStatus::Cancelled => state.coordinator.cancel(&id).await?,
        other => {
            return Err(AppError::invalid_request(format!(
                "Status {} cannot be set by an operator",
                other
            ))
            .with_detail("status", other.as_str()));
        }
    };
    Ok(Json(order))
}

pub async fn stats(State(state): State<ServerState>) -> AppResult<Json<StatsResponse>> {
    Ok(Json(StatsResponse {
        storage: state.orders.stats()?,
        box_status: state.coordinator.status(),
        devices: state.channel.connected_devices(),
        subscribers: state.channel.subscriber_count(),
    }))
}
