//! Telemetry API

use axum::{Json, Router, extract::State, routing::get};
use shared::models::TelemetrySample;

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().route("/telemetry", get(latest))
}

/// Latest global sample
async fn latest(State(state): State<ServerState>) -> Json<TelemetrySample> {
    Json(state.telemetry.latest())
}
