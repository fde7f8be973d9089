//! Locker Server - 智能取餐柜后端
//!
//! # 架构概述
//!
//! - **订单** (`orders`): redb 持久化的订单存储、状态机与取餐码分配
//! - **储物柜** (`locker`): 单柜预留、取餐码校验、FIFO 等待队列
//! - **遥测** (`telemetry`): 热/冷仓温度模拟
//! - **事件通道** (`message`): 主题发布/订阅，设备 TCP 链路
//! - **HTTP API** (`api`): RESTful 接口
//!
//! # 模块结构
//!
//! ```text
//! locker-server/src/
//! ├── core/          # 配置、状态、后台任务、服务器
//! ├── auth/          # 管理员令牌校验
//! ├── services/      # HTTP 服务组装
//! ├── api/           # HTTP 路由和处理器
//! ├── utils/         # 错误转换、日志
//! ├── message/       # 事件通道
//! ├── orders/        # 订单
//! ├── locker/        # 储物柜协调
//! └── telemetry/     # 温控遥测
//! ```

pub mod api;
pub mod auth;
pub mod core;
pub mod locker;
pub mod message;
pub mod orders;
pub mod services;
pub mod telemetry;
pub mod utils;

// Re-export 公共类型
pub use crate::core::{Config, Server, ServerState};
pub use locker::BoxCoordinator;
pub use message::EventChannel;
pub use orders::{OrderStorage, OrdersManager};
pub use utils::{AppError, AppResult};

// Re-export unified error types from shared
pub use utils::{ErrorCategory, ErrorCode, ErrorResponse};

pub use utils::logger::{init_logger, init_logger_with_file};

/// 安全审计日志
///
/// ```ignore
/// security_log!("WARN", "admin_token_missing", uri = format!("{:?}", req.uri()));
/// ```
#[macro_export]
macro_rules! security_log {
    ($level:expr, $event:expr, $($key:ident = $value:expr),*) => {
        tracing::info!(
            target: "security",
            level = $level,
            event = $event,
            $($key = $value),*
        );
    };
}

pub fn print_banner() {
    println!(
        r#"
    __               __
   / /   ____  _____/ /_____  _____
  / /   / __ \/ ___/ //_/ _ \/ ___/
 / /___/ /_/ / /__/ ,< /  __/ /
/_____/\____/\___/_/|_|\___/_/
                                  v{}
"#,
        env!("CARGO_PKG_VERSION")
    );
}

/// 设置运行环境：加载 `.env`，按配置初始化日志
///
/// 生产环境控制台输出 JSON；设置 `LOG_DIR` 时额外写入按天滚动的日志文件。
pub fn setup_environment() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let config = Config::from_env();
    init_logger_with_file(
        &config.log_level,
        config.is_production(),
        config.log_dir.as_deref(),
    )?;
    Ok(())
}
