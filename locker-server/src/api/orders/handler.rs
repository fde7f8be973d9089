//! Order API Handlers

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use shared::models::TelemetrySample;
use shared::order::{NewOrder, Order};

use crate::core::ServerState;
use crate::utils::{AppError, AppResult};

#[derive(Debug, Deserialize)]
pub struct OwnerQuery {
    pub owner: Option<String>,
}

/// Place an order; it starts `pending` with a fresh pickup code
pub async fn create(
    State(state): State<ServerState>,
    Json(payload): Json<NewOrder>,
) -> AppResult<Json<Order>> {
    let order = state.orders.create(payload).await?;
    Ok(Json(order))
}

pub async fn get_by_id(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<Order>> {
    let order = state.orders.get(&id)?;
    Ok(Json(order))
}

/// Orders of one customer, newest first
pub async fn list_by_owner(
    State(state): State<ServerState>,
    Query(query): Query<OwnerQuery>,
) -> AppResult<Json<Vec<Order>>> {
    let owner = query
        .owner
        .as_deref()
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .ok_or_else(|| AppError::validation("Query parameter `owner` is required"))?;
    let orders = state.orders.list_by_owner(owner)?;
    Ok(Json(orders))
}

/// Latest compartment sample of an active order
pub async fn telemetry(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<TelemetrySample>> {
    // 404 OrderNotFound for unknown ids, NotFound when no sample yet
    state.orders.get(&id)?;
    let sample = state
        .telemetry
        .for_order(&id)
        .ok_or_else(|| AppError::not_found(format!("Telemetry for order {}", id)))?;
    Ok(Json(sample))
}
