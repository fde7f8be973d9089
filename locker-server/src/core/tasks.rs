//! 后台任务
//!
//! 键盘监听、出餐模拟、遥测和设备链路都注册在 [`BackgroundTasks`] 中，
//! 共享一个取消令牌，关闭时统一等待退出 (超时则 abort)。

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    /// 长期运行，处理派生出的工作 (出餐模拟)
    Worker,
    /// 订阅事件通道或监听端口
    Listener,
    /// 定时触发 (遥测)
    Periodic,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Worker => "worker",
            TaskKind::Listener => "listener",
            TaskKind::Periodic => "periodic",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct TaskEntry {
    name: &'static str,
    kind: TaskKind,
    handle: JoinHandle<()>,
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}

/// 后台任务注册表
///
/// ```ignore
/// let mut tasks = BackgroundTasks::new();
/// tasks.spawn("telemetry_feed", TaskKind::Periodic, feed.run(interval, tasks.shutdown_token()));
/// tasks.shutdown(Duration::from_secs(10)).await;
/// ```
#[derive(Default)]
pub struct BackgroundTasks {
    entries: Vec<TaskEntry>,
    shutdown: CancellationToken,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// 任务内部用来监听关闭信号
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Spawn a named task; a panic or an exit before shutdown is logged
    pub fn spawn<F>(&mut self, name: &'static str, kind: TaskKind, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let token = self.shutdown.clone();
        let handle = tokio::spawn(async move {
            match AssertUnwindSafe(future).catch_unwind().await {
                Ok(()) if token.is_cancelled() => {
                    tracing::debug!(task = name, "Task stopped");
                }
                Ok(()) => {
                    tracing::warn!(task = name, kind = %kind, "Task exited before shutdown");
                }
                Err(payload) => {
                    tracing::error!(
                        task = name,
                        kind = %kind,
                        panic = %panic_message(payload.as_ref()),
                        "Task panicked"
                    );
                }
            }
        });

        tracing::debug!(task = name, kind = %kind, "Task registered");
        self.entries.push(TaskEntry { name, kind, handle });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|e| e.name).collect()
    }

    pub fn count(&self, kind: TaskKind) -> usize {
        self.entries.iter().filter(|e| e.kind == kind).count()
    }

    pub fn log_summary(&self) {
        tracing::info!(
            total = self.entries.len(),
            workers = self.count(TaskKind::Worker),
            listeners = self.count(TaskKind::Listener),
            periodic = self.count(TaskKind::Periodic),
            tasks = ?self.names(),
            "Background tasks started"
        );
    }

    /// Tasks that are no longer running
    pub fn finished(&self) -> Vec<&'static str> {
        self.entries
            .iter()
            .filter(|e| e.handle.is_finished())
            .map(|e| e.name)
            .collect()
    }

    /// Number of dead tasks, each one logged
    pub fn check_health(&self) -> usize {
        let finished = self.finished();
        for name in &finished {
            tracing::error!(task = name, "Background task is no longer running");
        }
        finished.len()
    }

    /// Cancel every task and wait for it; tasks still running at the deadline are aborted
    pub async fn shutdown(self, timeout: Duration) {
        tracing::info!(count = self.entries.len(), "Stopping background tasks");
        self.shutdown.cancel();

        let deadline = tokio::time::Instant::now() + timeout;
        for entry in self.entries {
            let abort = entry.handle.abort_handle();
            match tokio::time::timeout_at(deadline, entry.handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!(task = entry.name, error = ?e, "Task join failed"),
                Err(_) => {
                    tracing::warn!(task = entry.name, "Task did not stop in time, aborting");
                    abort.abort();
                }
            }
        }

        tracing::info!("Background tasks stopped");
    }
}
