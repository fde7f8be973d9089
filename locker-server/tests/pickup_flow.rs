//! End-to-end pickup with the background tasks running

use std::future::Future;
use std::time::Duration;

use locker_server::{Config, ServerState};
use serde_json::json;
use shared::message::topic;
use shared::models::{BoxStatus, KeypadResult};
use shared::order::{NewOrder, OrderItem, OrderStatus, ThermalClass};
use tempfile::TempDir;

async fn setup(prep_delay_ms: u64) -> (TempDir, ServerState) {
    let dir = TempDir::new().unwrap();
    let mut config = Config::with_overrides(dir.path().to_string_lossy(), 0, 0);
    config.prep_delay_ms = prep_delay_ms;
    config.telemetry_interval_ms = 20;
    let state = ServerState::initialize(&config).await.unwrap();
    (dir, state)
}

fn meal(owner_id: &str) -> NewOrder {
    NewOrder {
        owner_id: owner_id.to_string(),
        items: vec![
            OrderItem {
                product_id: "ramen".to_string(),
                name: "Ramen".to_string(),
                unit_price: 11.0,
                quantity: 1,
                thermal_class: ThermalClass::Hot,
            },
            OrderItem {
                product_id: "tea".to_string(),
                name: "Iced Tea".to_string(),
                unit_price: 2.5,
                quantity: 2,
                thermal_class: ThermalClass::Cold,
            },
        ],
        customer_details: None,
        total: Some(16.0),
    }
}

/// Poll until `check` holds or two seconds pass
async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..200 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

#[tokio::test]
async fn test_order_prepared_and_collected_through_keypad_topic() {
    let (_dir, state) = setup(30).await;
    let tasks = state.start_background_tasks().unwrap();
    let mut results = state.channel.subscribe(topic::BOX_KEYPAD_RESULT).unwrap();
    let mut box_events = state.channel.subscribe(topic::BOX_STATUS).unwrap();

    let order = state.orders.create(meal("u1")).await.unwrap();
    assert_eq!(order.total, 16.0);

    let orders = state.orders.clone();
    let id = order.id.clone();
    assert!(
        eventually(|| {
            let orders = orders.clone();
            let id = id.clone();
            async move { orders.get(&id).map(|o| o.status == OrderStatus::Ready).unwrap_or(false) }
        })
        .await
    );
    assert!(state.coordinator.status().is_occupied);
    let reserved: BoxStatus = box_events.recv().await.unwrap().parse_payload().unwrap();
    assert_eq!(reserved.reserved_for_user_id.as_deref(), Some("u1"));

    // 设备键盘输入经由事件通道
    state
        .channel
        .publish(topic::BOX_KEYPAD, &json!({ "code": order.code }))
        .await
        .unwrap();

    let result: KeypadResult = tokio::time::timeout(Duration::from_secs(2), results.recv())
        .await
        .unwrap()
        .unwrap()
        .parse_payload()
        .unwrap();
    assert!(result.matched);
    assert_eq!(state.orders.get(&order.id).unwrap().status, OrderStatus::Delivered);
    assert!(!state.coordinator.status().is_occupied);

    tokio::time::timeout(Duration::from_secs(2), tasks.shutdown(Duration::from_secs(1)))
        .await
        .unwrap();
    state.channel.close();
}

#[tokio::test]
async fn test_second_ready_order_waits_for_box() {
    let (_dir, state) = setup(0).await;
    let first = state.orders.create(meal("u1")).await.unwrap();
    let second = state.orders.create(meal("u2")).await.unwrap();

    state.coordinator.mark_ready(&first.id).await.unwrap();
    state.coordinator.mark_ready(&second.id).await.unwrap();
    assert_eq!(state.coordinator.status().waiting, 1);
    assert!(!state.coordinator.submit_code(&second.code).await.unwrap());

    assert!(state.coordinator.submit_code(&first.code).await.unwrap());
    assert_eq!(
        state.coordinator.status().reserved_for_user_id.as_deref(),
        Some("u2")
    );
    assert!(state.coordinator.submit_code(&second.code).await.unwrap());
    assert!(!state.coordinator.status().is_occupied);
}

#[tokio::test]
async fn test_orders_survive_restart() {
    let dir = TempDir::new().unwrap();
    let config = Config::with_overrides(dir.path().to_string_lossy(), 0, 0);

    let id = {
        let state = ServerState::initialize(&config).await.unwrap();
        let order = state.orders.create(meal("u1")).await.unwrap();
        state
            .orders
            .transition(&order.id, OrderStatus::Paid)
            .await
            .unwrap();
        order.id
    };

    let state = ServerState::initialize(&config).await.unwrap();
    let order = state.orders.get(&id).unwrap();
    assert_eq!(order.status, OrderStatus::Paid);
    assert_eq!(state.orders.active_orders().unwrap().len(), 1);
}

#[tokio::test]
async fn test_telemetry_runs_in_background() {
    let (_dir, state) = setup(0).await;
    let order = state.orders.create(meal("u1")).await.unwrap();
    let tasks = state.start_background_tasks().unwrap();

    let telemetry = state.telemetry.clone();
    let id = order.id.clone();
    assert!(
        eventually(|| {
            let telemetry = telemetry.clone();
            let id = id.clone();
            async move { telemetry.for_order(&id).is_some() }
        })
        .await
    );

    tasks.shutdown(Duration::from_secs(1)).await;
}
