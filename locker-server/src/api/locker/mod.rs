//! Locker API

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/box", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/keypad", post(handler::submit_code))
        .route("/status", get(handler::status))
}
