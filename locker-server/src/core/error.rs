use thiserror::Error;

use crate::locker::LockerError;
use crate::message::TransportError;
use crate::orders::StorageError;

/// 启动和运行阶段的服务器错误
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("存储初始化失败: {0}")]
    Storage(#[from] StorageError),

    #[error("事件通道错误: {0}")]
    Transport(#[from] TransportError),

    #[error("储物柜错误: {0}")]
    Locker(#[from] LockerError),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("内部服务器错误: {0}")]
    Internal(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, ServerError>;
