//! Inventory API (read side; updates live under /admin)

use std::collections::BTreeMap;

use axum::{Json, Router, extract::State, routing::get};

use crate::core::ServerState;
use crate::utils::AppResult;

pub fn router() -> Router<ServerState> {
    Router::new().route("/inventory", get(list))
}

/// `{ product_id: available }`; products never flagged are available
async fn list(State(state): State<ServerState>) -> AppResult<Json<BTreeMap<String, bool>>> {
    Ok(Json(state.orders.inventory()?))
}
