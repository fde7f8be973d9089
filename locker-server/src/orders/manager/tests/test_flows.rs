use super::*;
use crate::message::{SinkFilter, Transport, TransportError};
use async_trait::async_trait;
use shared::message::BusMessage;

#[derive(Debug)]
struct DeadTransport;

#[async_trait]
impl Transport for DeadTransport {
    async fn read_message(&self) -> Result<BusMessage, TransportError> {
        Err(TransportError::Disconnected)
    }

    async fn write_message(&self, _msg: &BusMessage) -> Result<(), TransportError> {
        Err(TransportError::Disconnected)
    }

    async fn close(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

#[tokio::test]
async fn test_create_publishes_code_then_status() {
    let (manager, channel) = create_manager_with_channel(ChannelConfig::default());
    let mut codes = channel.subscribe(topic::ORDER_CODE_PATTERN).unwrap();
    let mut statuses = channel.subscribe(topic::ORDER_STATUS_PATTERN).unwrap();

    let order = manager.create(burger_order("u1")).await.unwrap();

    let code_msg = codes.recv().await.unwrap();
    assert_eq!(code_msg.topic, format!("orders/{}/code", order.id));
    let code_event: OrderCodeEvent = code_msg.parse_payload().unwrap();
    assert_eq!(code_event.code, order.code);

    let status_event: OrderStatusEvent = statuses.recv().await.unwrap().parse_payload().unwrap();
    assert_eq!(status_event.status, OrderStatus::Pending);
    assert_eq!(status_event.previous, None);
}

#[tokio::test]
async fn test_status_events_in_transition_order() {
    let (manager, channel) = create_manager_with_channel(ChannelConfig::default());
    let order = manager.create(burger_order("u1")).await.unwrap();
    let mut statuses = channel.subscribe(&topic::order_status(&order.id)).unwrap();

    advance_to(&manager, &order.id, OrderStatus::Delivered).await;

    let mut seen = Vec::new();
    for _ in 0..3 {
        let event: OrderStatusEvent = statuses.recv().await.unwrap().parse_payload().unwrap();
        seen.push((event.previous, event.status));
    }
    assert_eq!(
        seen,
        vec![
            (Some(OrderStatus::Pending), OrderStatus::Paid),
            (Some(OrderStatus::Paid), OrderStatus::Ready),
            (Some(OrderStatus::Ready), OrderStatus::Delivered),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_failed_status_delivery_surfaces_after_commit() {
    let (manager, channel) = create_manager_with_channel(ChannelConfig {
        capacity: 16,
        max_retries: 2,
        retry_delay_ms: 50,
    });
    let order = manager.create(burger_order("u1")).await.unwrap();
    channel.register_transport("dead", Arc::new(DeadTransport), SinkFilter::default());

    let err = manager
        .transition(&order.id, OrderStatus::Paid)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ManagerError::Transport(TransportError::DeliveryFailed { attempts: 3, .. })
    ));

    // 状态已持久化，失败只影响通知
    assert_eq!(manager.get(&order.id).unwrap().status, OrderStatus::Paid);
}

#[tokio::test]
async fn test_closed_channel_fails_mutation_visibly() {
    let (manager, channel) = create_manager_with_channel(ChannelConfig::default());
    let order = manager.create(burger_order("u1")).await.unwrap();
    channel.close();

    assert!(matches!(
        manager.transition(&order.id, OrderStatus::Cancelled).await,
        Err(ManagerError::Transport(TransportError::Closed))
    ));
}
