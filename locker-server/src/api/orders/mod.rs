//! Order API
//!
//! | 路径 | 方法 | 说明 |
//! |------|------|------|
//! | /orders | POST | 下单 |
//! | /orders?owner= | GET | 某顾客的订单 (新到旧) |
//! | /orders/{id} | GET | 订单详情 |
//! | /orders/{id}/telemetry | GET | 订单最新温度样本 |

mod handler;

use axum::{
    Router,
    routing::get,
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/orders", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/", get(handler::list_by_owner).post(handler::create))
        .route("/{id}", get(handler::get_by_id))
        .route("/{id}/telemetry", get(handler::telemetry))
}
