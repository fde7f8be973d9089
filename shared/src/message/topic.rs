//! 主题命名与通配符匹配
//!
//! 主题以 `/` 分层。订阅模式支持 MQTT 风格通配符：
//! - `+` 匹配恰好一层
//! - `#` 只能出现在最后一层，匹配剩余的零层或多层

/// 键盘输入 (设备 -> 服务端)
pub const BOX_KEYPAD: &str = "box/keypad";
/// 键盘校验结果
pub const BOX_KEYPAD_RESULT: &str = "box/keypad/result";
/// 储物柜状态
pub const BOX_STATUS: &str = "box/status";
/// 全局温度采样
pub const TELEMETRY: &str = "telemetry";

/// 新订单取餐码
pub const ORDER_CODE_PATTERN: &str = "orders/+/code";
/// 所有订单状态
pub const ORDER_STATUS_PATTERN: &str = "orders/+/status";

pub fn order_code(order_id: &str) -> String {
    format!("orders/{}/code", order_id)
}

pub fn order_status(order_id: &str) -> String {
    format!("orders/{}/status", order_id)
}

pub fn order_telemetry(order_id: &str) -> String {
    format!("orders/{}/telemetry", order_id)
}

pub fn inventory(product_id: &str) -> String {
    format!("inventory/{}", product_id)
}

/// 状态主题需要可靠投递
pub fn is_status_topic(topic: &str) -> bool {
    topic == BOX_STATUS || (topic.starts_with("orders/") && topic.ends_with("/status"))
}

/// 校验订阅模式：`#` 只能位于最后一层，通配符必须独占一层
pub fn is_valid_pattern(pattern: &str) -> bool {
    if pattern.is_empty() {
        return false;
    }
    let levels: Vec<&str> = pattern.split('/').collect();
    let last = levels.len() - 1;
    levels.iter().enumerate().all(|(i, level)| match *level {
        "#" => i == last,
        "+" => true,
        other => !other.contains('#') && !other.contains('+'),
    })
}

/// 判断主题是否匹配订阅模式
pub fn matches(pattern: &str, topic: &str) -> bool {
    let mut pattern_levels = pattern.split('/');
    let mut topic_levels = topic.split('/');

    loop {
        match (pattern_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => {}
            (Some(p), Some(t)) if p == t => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}
