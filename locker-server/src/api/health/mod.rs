//! 健康检查路由 (无需认证)
//!
//! - `GET /health`: 存活与概况 (活跃订单数、储物柜是否占用)
//! - `GET /health/detailed`: 逐项检查存储与事件通道，附运行时长

use std::sync::OnceLock;
use std::time::Instant;

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/detailed", get(detailed_health))
}

#[derive(Debug, Serialize)]
pub struct HealthSummary {
    status: &'static str,
    version: &'static str,
    /// None when storage cannot be read
    active_orders: Option<u64>,
    box_occupied: bool,
    waiting_orders: usize,
}

#[derive(Debug, Serialize)]
pub struct ComponentCheck {
    component: &'static str,
    healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    latency_us: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthReport {
    status: &'static str,
    version: &'static str,
    uptime_seconds: u64,
    subscribers: usize,
    devices: usize,
    components: Vec<ComponentCheck>,
}

// 首次访问时记录，近似服务器启动时间
static STARTED: OnceLock<Instant> = OnceLock::new();

fn status_label(healthy: bool) -> &'static str {
    if healthy { "healthy" } else { "degraded" }
}

pub async fn health(State(state): State<ServerState>) -> Json<HealthSummary> {
    STARTED.get_or_init(Instant::now);

    let active_orders = state.orders.stats().ok().map(|s| s.active_order_count);
    let box_status = state.coordinator.status();

    Json(HealthSummary {
        status: status_label(active_orders.is_some()),
        version: env!("CARGO_PKG_VERSION"),
        active_orders,
        box_occupied: box_status.is_occupied,
        waiting_orders: box_status.waiting,
    })
}

pub async fn detailed_health(State(state): State<ServerState>) -> Json<HealthReport> {
    let started = STARTED.get_or_init(Instant::now);

    let check_start = Instant::now();
    let storage = match state.orders.stats() {
        Ok(_) => ComponentCheck {
            component: "storage",
            healthy: true,
            latency_us: Some(check_start.elapsed().as_micros() as u64),
            error: None,
        },
        Err(e) => ComponentCheck {
            component: "storage",
            healthy: false,
            latency_us: None,
            error: Some(e.to_string()),
        },
    };

    let channel = ComponentCheck {
        component: "event_channel",
        healthy: !state.channel.is_closed(),
        latency_us: None,
        error: state.channel.is_closed().then(|| "closed".to_string()),
    };

    let components = vec![storage, channel];
    let healthy = components.iter().all(|c| c.healthy);

    Json(HealthReport {
        status: status_label(healthy),
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: started.elapsed().as_secs(),
        subscribers: state.channel.subscriber_count(),
        devices: state.channel.connected_devices().len(),
        components,
    })
}
