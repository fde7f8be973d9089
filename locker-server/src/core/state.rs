use std::sync::Arc;

use crate::core::tasks::{BackgroundTasks, TaskKind};
use crate::core::{Config, Result};
use crate::locker::{BoxCoordinator, LockerResult};
use crate::message::{ChannelConfig, EventChannel, KeypadListener};
use crate::orders::{OrderStorage, OrdersManager, PrepWorker};
use crate::telemetry::TelemetryFeed;

/// 服务器状态 - 持有所有组件的共享引用
///
/// 使用 Arc 实现浅拷贝，可直接作为 axum 的 `State`。
///
/// | 字段 | 类型 | 说明 |
/// |------|------|------|
/// | config | Config | 配置项 (不可变) |
/// | channel | EventChannel | 事件通道 |
/// | orders | Arc<OrdersManager> | 订单存储与状态机 |
/// | coordinator | Arc<BoxCoordinator> | 储物柜预留与取餐码校验 |
/// | telemetry | Arc<TelemetryFeed> | 温控遥测 |
#[derive(Clone, Debug)]
pub struct ServerState {
    pub config: Config,
    pub channel: EventChannel,
    pub orders: Arc<OrdersManager>,
    pub coordinator: Arc<BoxCoordinator>,
    pub telemetry: Arc<TelemetryFeed>,
}

impl ServerState {
    /// 初始化服务器状态
    ///
    /// 按顺序初始化：
    /// 1. 工作目录 (work_dir/database)
    /// 2. 数据库 (work_dir/database/locker.redb)
    /// 3. 事件通道和各组件
    pub async fn initialize(config: &Config) -> Result<Self> {
        std::fs::create_dir_all(config.database_dir())?;

        let db_path = config.database_path();
        let storage = OrderStorage::open(&db_path)?;
        tracing::info!(path = %db_path.display(), "Order storage opened");

        Ok(Self::with_storage(config, storage))
    }

    /// 使用现有存储构建状态 (测试常用)
    pub fn with_storage(config: &Config, storage: OrderStorage) -> Self {
        let channel = EventChannel::from_config(ChannelConfig {
            capacity: config.event_channel_capacity,
            max_retries: config.publish_max_retries,
            retry_delay_ms: config.publish_retry_delay_ms,
        });
        let orders = Arc::new(OrdersManager::new(storage, channel.clone()));
        let coordinator = Arc::new(BoxCoordinator::new(orders.clone(), channel.clone()));
        let telemetry = Arc::new(TelemetryFeed::new(orders.clone(), channel.clone()));

        Self {
            config: config.clone(),
            channel,
            orders,
            coordinator,
            telemetry,
        }
    }

    /// 启动后台任务
    ///
    /// - 键盘监听 (Listener)
    /// - 出餐模拟 (Worker, `PREP_DELAY_MS` > 0)
    /// - 遥测 (Periodic)
    /// - 设备链路 TCP 服务 (Listener, `DEVICE_TCP_PORT` > 0)
    pub fn start_background_tasks(&self) -> Result<BackgroundTasks> {
        let mut tasks = BackgroundTasks::new();

        let listener = KeypadListener::new(
            &self.channel,
            self.coordinator.clone(),
            tasks.shutdown_token(),
        )?;
        tasks.spawn("keypad_listener", TaskKind::Listener, listener.run());

        if let Some(delay) = self.config.prep_delay() {
            let worker = PrepWorker::new(
                &self.channel,
                self.orders.clone(),
                self.coordinator.clone(),
                delay,
                tasks.shutdown_token(),
            )?;
            tasks.spawn("prep_worker", TaskKind::Worker, worker.run());
        } else {
            tracing::info!("Prep worker disabled, orders advance through the admin API");
        }

        tasks.spawn(
            "telemetry_feed",
            TaskKind::Periodic,
            self.telemetry
                .clone()
                .run(self.config.telemetry_interval(), tasks.shutdown_token()),
        );

        if self.config.device_tcp_port > 0 {
            let channel = self.channel.clone();
            let token = tasks.shutdown_token();
            let addr = format!("0.0.0.0:{}", self.config.device_tcp_port);
            tasks.spawn("device_link", TaskKind::Listener, async move {
                tokio::select! {
                    _ = token.cancelled() => {}
                    result = channel.start_tcp_server(&addr) => {
                        if let Err(e) = result {
                            tracing::error!(addr = %addr, error = %e, "Device link server failed");
                        }
                    }
                }
            });
        }

        tasks.log_summary();
        Ok(tasks)
    }

    /// 管理员重置：在协调锁内清空所有订单、储物柜预留与等待队列
    pub async fn reset_all(&self) -> LockerResult<u64> {
        self.coordinator.reset_all().await
    }

    /// 打印启动信息 (日志)
    pub fn log_startup(&self) {
        tracing::info!("════════════════════════════════════════════════════════");
        tracing::info!("  HTTP API     : http://0.0.0.0:{}", self.config.http_port);
        if self.config.device_tcp_port > 0 {
            tracing::info!("  Device link  : tcp://0.0.0.0:{}", self.config.device_tcp_port);
        }
        tracing::info!("  Database     : {}", self.config.database_path().display());
        tracing::info!("  Environment  : {}", self.config.environment);
        tracing::info!("════════════════════════════════════════════════════════");
    }
}
