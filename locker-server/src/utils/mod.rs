//! 工具模块 - 通用工具函数和类型
//!
//! # 内容
//!
//! - [`AppError`] - 应用错误类型 (from shared::error)
//! - [`ErrorResponse`] - 错误响应体 (from shared::error)
//! - 日志初始化

pub mod error;
pub mod logger;
pub mod result;

// Re-export error types from the error module (which re-exports from shared)
pub use error::{AppError, ErrorCategory, ErrorCode, ErrorResponse};
pub use result::AppResult;
