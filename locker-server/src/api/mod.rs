//! API 路由模块
//!
//! # 结构
//!
//! - [`health`] - 健康检查
//! - [`orders`] - 下单与订单查询
//! - [`locker`] - 键盘输入与储物柜状态
//! - [`telemetry`] - 温控遥测
//! - [`inventory`] - 菜品可售状态
//! - [`admin`] - 管理接口 (需要 `x-admin-token`)

pub mod admin;
pub mod health;
pub mod inventory;
pub mod locker;
pub mod orders;
pub mod telemetry;

// Re-export common types for handlers
pub use crate::utils::{AppError, AppResult};
