use super::*;
use crate::message::ChannelConfig;
use shared::order::{OrderItem, ThermalClass};

mod test_flows;

fn create_test_manager() -> OrdersManager {
    let storage = OrderStorage::open_in_memory().unwrap();
    OrdersManager::new(storage, EventChannel::new())
}

fn create_manager_with_channel(config: ChannelConfig) -> (OrdersManager, EventChannel) {
    let storage = OrderStorage::open_in_memory().unwrap();
    let channel = EventChannel::from_config(config);
    (OrdersManager::new(storage, channel.clone()), channel)
}

fn item(product_id: &str, price: f64, quantity: u32, thermal_class: ThermalClass) -> OrderItem {
    OrderItem {
        product_id: product_id.to_string(),
        name: product_id.to_uppercase(),
        unit_price: price,
        quantity,
        thermal_class,
    }
}

fn burger_order(owner_id: &str) -> NewOrder {
    NewOrder {
        owner_id: owner_id.to_string(),
        items: vec![item("burger", 8.5, 1, ThermalClass::Hot)],
        customer_details: None,
        total: None,
    }
}

/// Drive an order along allowed edges to `target`
async fn advance_to(manager: &OrdersManager, order_id: &str, target: OrderStatus) {
    let path: &[OrderStatus] = match target {
        OrderStatus::Pending => &[],
        OrderStatus::Paid => &[OrderStatus::Paid],
        OrderStatus::Ready => &[OrderStatus::Paid, OrderStatus::Ready],
        OrderStatus::Delivered => &[OrderStatus::Paid, OrderStatus::Ready, OrderStatus::Delivered],
        OrderStatus::Cancelled => &[OrderStatus::Cancelled],
    };
    for status in path {
        manager.transition(order_id, *status).await.unwrap();
    }
}
