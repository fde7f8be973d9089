//! Admin API
//!
//! | 路径 | 方法 | 说明 |
//! |------|------|------|
//! | /admin/reset | POST | 清空所有订单和储物柜状态 |
//! | /admin/inventory/{product_id} | PATCH | 设置菜品可售状态 |
//! | /admin/orders?q= | GET | 订单搜索 (id / 取餐码 / 顾客) |
//! | /admin/orders/{id}/status | POST | 人工推进订单: paid / ready / cancelled |
//! | /admin/stats | GET | 存储、储物柜与设备概况 |
//!
//! 所有路由都需要 `x-admin-token`。

mod handler;

use axum::{
    Router, middleware,
    routing::{get, patch, post},
};

use crate::auth::require_admin;
use crate::core::ServerState;

pub fn router(state: &ServerState) -> Router<ServerState> {
    Router::new().nest("/admin", routes(state))
}

fn routes(state: &ServerState) -> Router<ServerState> {
    Router::new()
        .route("/reset", post(handler::reset))
        .route("/inventory/{product_id}", patch(handler::set_inventory))
        .route("/orders", get(handler::search_orders))
        .route("/orders/{id}/status", post(handler::update_status))
        .route("/stats", get(handler::stats))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin))
}
