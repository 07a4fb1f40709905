//! 输入验证辅助函数

use crate::utils::response::bad_request_error;
use axum::response::Response;

/// 必填字段：去除首尾空格后不能为空
pub fn normalize_required(value: String, field: &str) -> Result<String, Response> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(bad_request_error(format!("{field} required")));
    }
    Ok(trimmed.to_string())
}
