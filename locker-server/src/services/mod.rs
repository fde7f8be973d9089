//! 服务层
//!
//! - [`https`] - HTTP 路由与中间件组装

pub mod https;

pub use https::build_app;
