use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// 服务器配置
///
/// # 环境变量
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | WORK_DIR | ./data | 工作目录 (数据库) |
/// | HTTP_PORT | 3000 | HTTP API 端口 |
/// | DEVICE_TCP_PORT | 8081 | 键盘设备链路端口 (0 = 关闭) |
/// | ENVIRONMENT | development | 运行环境 |
/// | LOG_LEVEL | info | 日志级别 |
/// | LOG_DIR | - | 日志目录 (可选) |
/// | ADMIN_TOKEN | admin | 管理接口令牌 |
/// | TELEMETRY_INTERVAL_MS | 3000 | 遥测间隔 |
/// | PREP_DELAY_MS | 5000 | 模拟出餐时间 (0 = 关闭) |
/// | EVENT_CHANNEL_CAPACITY | 1024 | 订阅者队列容量 |
/// | PUBLISH_MAX_RETRIES | 3 | 可靠发布重试次数 |
/// | PUBLISH_RETRY_DELAY_MS | 100 | 重试基础延迟 |
/// | SHUTDOWN_TIMEOUT_MS | 10000 | 优雅关闭超时 |
///
/// # 示例
///
/// ```ignore
/// WORK_DIR=/srv/locker HTTP_PORT=8080 cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// 工作目录
    pub work_dir: String,
    pub http_port: u16,
    pub device_tcp_port: u16,
    /// 运行环境: development | staging | production
    pub environment: String,
    pub log_level: String,
    pub log_dir: Option<String>,
    /// `x-admin-token` 的期望值
    pub admin_token: String,
    pub telemetry_interval_ms: u64,
    pub prep_delay_ms: u64,
    pub event_channel_capacity: usize,
    pub publish_max_retries: u32,
    pub publish_retry_delay_ms: u64,
    pub shutdown_timeout_ms: u64,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 未设置或无法解析时使用默认值
    pub fn from_env() -> Self {
        Self {
            work_dir: std::env::var("WORK_DIR").unwrap_or_else(|_| "./data".into()),
            http_port: env_or("HTTP_PORT", 3000),
            device_tcp_port: env_or("DEVICE_TCP_PORT", 8081),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_dir: std::env::var("LOG_DIR").ok().filter(|d| !d.trim().is_empty()),
            admin_token: std::env::var("ADMIN_TOKEN").unwrap_or_else(|_| "admin".into()),
            telemetry_interval_ms: env_or("TELEMETRY_INTERVAL_MS", 3000),
            prep_delay_ms: env_or("PREP_DELAY_MS", 5000),
            event_channel_capacity: env_or("EVENT_CHANNEL_CAPACITY", 1024),
            publish_max_retries: env_or("PUBLISH_MAX_RETRIES", 3),
            publish_retry_delay_ms: env_or("PUBLISH_RETRY_DELAY_MS", 100),
            shutdown_timeout_ms: env_or("SHUTDOWN_TIMEOUT_MS", 10000),
        }
    }

    /// 使用自定义值覆盖部分配置
    ///
    /// 常用于测试场景
    pub fn with_overrides(work_dir: impl Into<String>, http_port: u16, device_tcp_port: u16) -> Self {
        let mut config = Self::from_env();
        config.work_dir = work_dir.into();
        config.http_port = http_port;
        config.device_tcp_port = device_tcp_port;
        config
    }

    /// work_dir/database
    pub fn database_dir(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("database")
    }

    /// work_dir/database/locker.redb
    pub fn database_path(&self) -> PathBuf {
        self.database_dir().join("locker.redb")
    }

    pub fn telemetry_interval(&self) -> Duration {
        // interval() panics on a zero period
        Duration::from_millis(self.telemetry_interval_ms.max(1))
    }

    /// None when kitchen simulation is disabled
    pub fn prep_delay(&self) -> Option<Duration> {
        (self.prep_delay_ms > 0).then(|| Duration::from_millis(self.prep_delay_ms))
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// 是否生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// 是否开发环境
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_and_durations() {
        let mut config = Config::with_overrides("/tmp/locker", 0, 0);
        assert_eq!(config.database_path(), PathBuf::from("/tmp/locker/database/locker.redb"));

        config.prep_delay_ms = 0;
        assert!(config.prep_delay().is_none());
        config.prep_delay_ms = 250;
        assert_eq!(config.prep_delay(), Some(Duration::from_millis(250)));

        config.telemetry_interval_ms = 0;
        assert_eq!(config.telemetry_interval(), Duration::from_millis(1));
    }

    #[test]
    fn test_environment_flags() {
        let mut config = Config::with_overrides("/tmp/locker", 0, 0);
        config.environment = "production".to_string();
        assert!(config.is_production());
        assert!(!config.is_development());
    }
}
