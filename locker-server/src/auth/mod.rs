//! 管理接口鉴权
//!
//! 粗粒度的管理员令牌校验：`x-admin-token` 必须等于配置的 `ADMIN_TOKEN`。

mod middleware;

pub use middleware::{ADMIN_TOKEN_HEADER, require_admin};
