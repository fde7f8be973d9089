//! 温控遥测
//!
//! 按固定间隔为每个未终结订单生成热/冷仓温度样本，并发布到
//! `telemetry` 与 `orders/{id}/telemetry`。离开活跃集合的订单样本会被清除。

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::RwLock;
use rand::Rng;
use shared::message::topic;
use shared::models::{COLD_RANGE_C, HOT_RANGE_C, TelemetrySample};
use shared::util::now_millis;
use tokio_util::sync::CancellationToken;

use crate::message::EventChannel;
use crate::orders::OrdersManager;

/// Random reading inside both bands, rounded to 0.1 °C
pub fn sample() -> TelemetrySample {
    let mut rng = rand::thread_rng();
    TelemetrySample {
        hot_c: round_tenth(rng.gen_range(HOT_RANGE_C)),
        cold_c: round_tenth(rng.gen_range(COLD_RANGE_C)),
        sampled_at: now_millis(),
    }
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[derive(Debug)]
pub struct TelemetryFeed {
    orders: Arc<OrdersManager>,
    channel: EventChannel,
    latest: RwLock<Option<TelemetrySample>>,
    per_order: DashMap<String, TelemetrySample>,
}

impl TelemetryFeed {
    pub fn new(orders: Arc<OrdersManager>, channel: EventChannel) -> Self {
        Self {
            orders,
            channel,
            latest: RwLock::new(None),
            per_order: DashMap::new(),
        }
    }

    /// Latest global sample; a fresh one before the first tick
    pub fn latest(&self) -> TelemetrySample {
        let latest = *self.latest.read();
        latest.unwrap_or_else(sample)
    }

    /// Latest sample of one active order
    pub fn for_order(&self, order_id: &str) -> Option<TelemetrySample> {
        self.per_order.get(order_id).map(|s| *s)
    }

    pub fn tracked_orders(&self) -> usize {
        self.per_order.len()
    }

    /// One emission round; returns the number of orders sampled
    pub async fn tick(&self) -> usize {
        let active = match self.orders.active_orders() {
            Ok(orders) => orders,
            Err(e) => {
                tracing::warn!(error = %e, "Telemetry tick skipped, active orders unavailable");
                return 0;
            }
        };

        let global = sample();
        *self.latest.write() = Some(global);
        if let Err(e) = self.channel.publish(topic::TELEMETRY, &global).await {
            tracing::debug!(error = %e, "Telemetry publish failed");
        }

        self.per_order
            .retain(|order_id, _| active.iter().any(|o| &o.id == order_id));

        for order in &active {
            let reading = sample();
            self.per_order.insert(order.id.clone(), reading);
            if let Err(e) = self
                .channel
                .publish(&topic::order_telemetry(&order.id), &reading)
                .await
            {
                tracing::debug!(order_id = %order.id, error = %e, "Order telemetry publish failed");
            }
        }

        tracing::trace!(orders = active.len(), "Telemetry tick");
        active.len()
    }

    /// Periodic emission until shutdown
    pub async fn run(self: Arc<Self>, interval: Duration, shutdown: CancellationToken) {
        tracing::info!(interval_ms = interval.as_millis() as u64, "Telemetry feed started");

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    self.tick().await;
                }
            }
        }

        tracing::info!("Telemetry feed stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::OrderStorage;
    use shared::order::{NewOrder, OrderItem, OrderStatus, ThermalClass};

    fn setup() -> (EventChannel, Arc<OrdersManager>, Arc<TelemetryFeed>) {
        let channel = EventChannel::new();
        let storage = OrderStorage::open_in_memory().unwrap();
        let orders = Arc::new(OrdersManager::new(storage, channel.clone()));
        let feed = Arc::new(TelemetryFeed::new(orders.clone(), channel.clone()));
        (channel, orders, feed)
    }

    fn soup(owner_id: &str) -> NewOrder {
        NewOrder {
            owner_id: owner_id.to_string(),
            items: vec![OrderItem {
                product_id: "soup".to_string(),
                name: "Soup".to_string(),
                unit_price: 4.25,
                quantity: 1,
                thermal_class: ThermalClass::Hot,
            }],
            customer_details: None,
            total: None,
        }
    }

    #[test]
    fn test_samples_stay_in_band() {
        for _ in 0..500 {
            let s = sample();
            assert!(s.in_band(), "out of band: {:?}", s);
        }
    }

    #[test]
    fn test_latest_before_first_tick() {
        let (_channel, _orders, feed) = setup();
        assert!(feed.latest().in_band());
        assert!(feed.for_order("nope").is_none());
    }

    #[tokio::test]
    async fn test_tick_samples_active_orders_and_prunes() {
        let (_channel, orders, feed) = setup();
        let a = orders.create(soup("u1")).await.unwrap();
        let b = orders.create(soup("u2")).await.unwrap();

        assert_eq!(feed.tick().await, 2);
        assert!(feed.for_order(&a.id).is_some());
        assert!(feed.for_order(&b.id).is_some());

        orders
            .transition(&a.id, OrderStatus::Cancelled)
            .await
            .unwrap();
        assert_eq!(feed.tick().await, 1);
        assert!(feed.for_order(&a.id).is_none());
        assert!(feed.for_order(&b.id).is_some());
        assert_eq!(feed.tracked_orders(), 1);
    }

    #[tokio::test]
    async fn test_tick_publishes_global_and_per_order() {
        let (channel, orders, feed) = setup();
        let mut global = channel.subscribe(topic::TELEMETRY).unwrap();
        let mut per_order = channel.subscribe("orders/+/telemetry").unwrap();
        let order = orders.create(soup("u1")).await.unwrap();

        feed.tick().await;

        let sample: TelemetrySample = global.recv().await.unwrap().parse_payload().unwrap();
        assert_eq!(Some(sample), Some(feed.latest()));

        let msg = per_order.recv().await.unwrap();
        assert_eq!(msg.topic, topic::order_telemetry(&order.id));
        let reading: TelemetrySample = msg.parse_payload().unwrap();
        assert_eq!(Some(reading), feed.for_order(&order.id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_ticks_until_shutdown() {
        let (_channel, orders, feed) = setup();
        let order = orders.create(soup("u1")).await.unwrap();
        let token = CancellationToken::new();

        let handle = tokio::spawn(feed.clone().run(Duration::from_secs(3), token.clone()));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(feed.for_order(&order.id).is_some());

        token.cancel();
        handle.await.unwrap();
    }
}
