//! Order records and checkout requests

use super::OrderStatus;
use serde::{Deserialize, Serialize};

/// Compartment an item is kept in while waiting for pickup
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ThermalClass {
    Hot,
    Cold,
}

/// One line of an order, priced at checkout time
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItem {
    /// Product ID
    pub product_id: String,
    /// Product name
    pub name: String,
    /// Unit price snapshot
    pub unit_price: f64,
    /// Quantity (>= 1)
    pub quantity: u32,
    /// Hot or cold compartment
    pub thermal_class: ThermalClass,
}

/// Customer snapshot captured at checkout
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct CustomerDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
}

/// Order record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    /// Order ID (UUID v4, assigned by server)
    pub id: String,
    /// Customer who placed the order
    pub owner_id: String,
    /// Items, in checkout order
    pub items: Vec<OrderItem>,
    /// Sum of unit_price x quantity at creation; never recomputed
    pub total: f64,
    /// Lifecycle state
    pub status: OrderStatus,
    /// 4-digit pickup code
    pub code: String,
    /// Creation time (Unix millis)
    pub created_at: i64,
    /// Last transition time (Unix millis)
    pub updated_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_details: Option<CustomerDetails>,
}

impl Order {
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Case-insensitive substring match over id, code and owner id
    pub fn matches_query(&self, query: &str) -> bool {
        let q = query.to_lowercase();
        self.id.to_lowercase().contains(&q)
            || self.code.contains(&q)
            || self.owner_id.to_lowercase().contains(&q)
    }
}

/// Checkout request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewOrder {
    pub owner_id: String,
    pub items: Vec<OrderItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_details: Option<CustomerDetails>,
    /// Client-computed total, checked against the item sum when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_order() -> Order {
        Order {
            id: "6f1c2e1a-0000-4000-8000-000000000001".to_string(),
            owner_id: "Alice".to_string(),
            items: vec![OrderItem {
                product_id: "burger".to_string(),
                name: "Burger".to_string(),
                unit_price: 8.5,
                quantity: 1,
                thermal_class: ThermalClass::Hot,
            }],
            total: 8.5,
            status: OrderStatus::Pending,
            code: "4821".to_string(),
            created_at: 1,
            updated_at: 1,
            customer_details: None,
        }
    }

    #[test]
    fn test_matches_query() {
        let order = sample_order();
        assert!(order.matches_query("alice"));
        assert!(order.matches_query("482"));
        assert!(order.matches_query("6F1C"));
        assert!(!order.matches_query("bob"));
    }

    #[test]
    fn test_new_order_optional_fields() {
        let json = r#"{"owner_id":"u1","items":[{"product_id":"cola","name":"Cola","unit_price":2.0,"quantity":2,"thermal_class":"cold"}]}"#;
        let req: NewOrder = serde_json::from_str(json).unwrap();
        assert_eq!(req.items[0].thermal_class, ThermalClass::Cold);
        assert!(req.total.is_none());
        assert!(req.customer_details.is_none());
    }
}
