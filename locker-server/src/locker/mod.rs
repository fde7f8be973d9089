//! 储物柜协调
//!
//! 单个物理储物柜：同一时刻最多一个订单持有预留，其余就绪订单按 FIFO 排队。

mod coordinator;
mod error;

pub use coordinator::{BoxCoordinator, Placement};
pub use error::{LockerError, LockerResult};
