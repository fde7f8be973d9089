//! 统一错误处理
//!
//! 领域错误 (`StorageError`, `ManagerError`, `LockerError`, `TransportError`)
//! 在 HTTP 边界转换为 [`AppError`]，由 shared 提供统一的错误码和响应结构。

pub use shared::error::{AppError, ErrorCategory, ErrorCode, ErrorResponse};

use crate::locker::LockerError;
use crate::message::TransportError;
use crate::orders::manager::{ManagerError, ValidationError};
use crate::orders::storage::StorageError;

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        tracing::error!(error = %err, "Storage error occurred");
        AppError::database(err.to_string())
    }
}

impl From<TransportError> for AppError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::InvalidPattern(pattern) => {
                AppError::validation(format!("Invalid topic pattern: {}", pattern))
                    .with_detail("pattern", pattern)
            }
            other => AppError::transport(other.to_string()),
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        let code = match &err {
            ValidationError::EmptyOrder => ErrorCode::OrderEmpty,
            ValidationError::MissingOwner => ErrorCode::ValidationFailed,
            ValidationError::InvalidQuantity { .. } => ErrorCode::InvalidQuantity,
            ValidationError::InvalidPrice { .. } => ErrorCode::InvalidPrice,
            ValidationError::TotalMismatch { .. } => ErrorCode::TotalMismatch,
        };
        let mut app = AppError::with_message(code, err.to_string());
        if let Some(index) = err.item_index() {
            app = app.with_detail("item_index", index);
        }
        app
    }
}

impl From<ManagerError> for AppError {
    fn from(err: ManagerError) -> Self {
        match err {
            ManagerError::Storage(e) => e.into(),
            ManagerError::Transport(e) => e.into(),
            ManagerError::Validation(e) => e.into(),
            ManagerError::OrderNotFound(id) => AppError::order_not_found(id),
            ManagerError::InvalidTransition { from, to, .. } => {
                AppError::invalid_transition(from.as_str(), to.as_str())
            }
            ManagerError::CodeSpaceExhausted => AppError::new(ErrorCode::CodeSpaceExhausted),
        }
    }
}

impl From<LockerError> for AppError {
    fn from(err: LockerError) -> Self {
        match err {
            LockerError::BoxBusy { .. } => AppError::box_busy(),
            LockerError::NotReady { status, .. } => {
                AppError::invalid_transition(status.as_str(), "reserved")
            }
            LockerError::Order(e) => e.into(),
            LockerError::Transport(e) => e.into(),
        }
    }
}
