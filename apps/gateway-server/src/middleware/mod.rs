//! 管理 API 中间件

pub mod request_context;

pub use request_context::request_context;
