//! 订单模块
//!
//! - **storage**: redb 持久化 (订单、活跃取餐码、库存标记)
//! - **manager**: OrdersManager，创建订单、状态流转、查询
//! - **code**: 4 位取餐码生成
//! - **money**: 金额计算与下单校验
//! - **prep_worker**: 模拟厨房出餐，订单就绪后交给储物柜
//!
//! # Data Flow
//!
//! ```text
//! POST /orders → OrdersManager::create → redb (order + code claim)
//!                        ↓
//!          orders/{id}/code, orders/{id}/status
//!                        ↓
//!                   PrepWorker → BoxCoordinator::mark_ready
//! ```

pub mod code;
pub mod manager;
pub mod money;
pub mod prep_worker;
pub mod storage;

// Re-exports
pub use manager::{ManagerError, ManagerResult, OrdersManager, ValidationError};
pub use prep_worker::PrepWorker;
pub use storage::{OrderStorage, StorageError, StorageStats};
