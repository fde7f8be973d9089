//! 鉴权中间件

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::core::ServerState;
use crate::security_log;
use crate::utils::AppError;

pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// 管理员中间件 - 要求 `x-admin-token` 与配置一致
///
/// | 情况 | HTTP 状态码 |
/// |------|------------|
/// | 缺少请求头 | 403 AdminRequired |
/// | 令牌不匹配 | 403 AdminRequired |
pub async fn require_admin(
    State(state): State<ServerState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    // CORS 预检直接放行
    if req.method() == http::Method::OPTIONS {
        return Ok(next.run(req).await);
    }

    let token = req
        .headers()
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|h| h.to_str().ok());

    match token {
        Some(token) if constant_time_eq(token.as_bytes(), state.config.admin_token.as_bytes()) => {
            Ok(next.run(req).await)
        }
        Some(_) => {
            security_log!("WARN", "admin_token_rejected", uri = format!("{:?}", req.uri()));
            Err(AppError::admin_required())
        }
        None => {
            security_log!("WARN", "admin_token_missing", uri = format!("{:?}", req.uri()));
            Err(AppError::admin_required())
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"admin", b"admin"));
        assert!(!constant_time_eq(b"admin", b"admiN"));
        assert!(!constant_time_eq(b"admin", b"admin2"));
        assert!(!constant_time_eq(b"", b"admin"));
    }
}
