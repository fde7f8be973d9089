//! Locker API Handlers

use axum::{Json, extract::State};
use serde::Serialize;
use shared::models::{BoxStatus, KeypadInput};

use crate::core::ServerState;
use crate::utils::AppResult;

#[derive(Debug, Serialize)]
pub struct KeypadResponse {
    pub matched: bool,
}

/// Keypad entry over HTTP; same path as the `box/keypad` topic
pub async fn submit_code(
    State(state): State<ServerState>,
    Json(input): Json<KeypadInput>,
) -> AppResult<Json<KeypadResponse>> {
    let matched = state.coordinator.submit_code(input.code.trim()).await?;
    Ok(Json(KeypadResponse { matched }))
}

pub async fn status(State(state): State<ServerState>) -> Json<BoxStatus> {
    Json(state.coordinator.status())
}
