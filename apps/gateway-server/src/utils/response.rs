//! HTTP 响应辅助函数
//!
//! 所有响应使用统一的 ApiResponse 封装，HTTP 状态码与错误码对应：
//! - 400 INVALID.REQUEST / CONFIG.INVALID / SCRIPT.INVALID / DECODER.UNKNOWN
//! - 404 RESOURCE.NOT_FOUND
//! - 409 RESOURCE.EXISTS
//! - 500 INTERNAL.ERROR

use api_contract::{ApiResponse, ListenerStatusDto};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use gateway_control::{ControlError, ListenerState};
use gateway_storage::StorageError;
use serde::Serialize;

/// 成功响应
pub fn ok<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
}

/// 错误请求响应
pub fn bad_request_error(message: impl Into<String>) -> Response {
    error_response(StatusCode::BAD_REQUEST, "INVALID.REQUEST", message)
}

/// 资源未找到错误响应
pub fn not_found_error() -> Response {
    error_response(StatusCode::NOT_FOUND, "RESOURCE.NOT_FOUND", "not found")
}

/// 存储错误响应
pub fn storage_error(err: StorageError) -> Response {
    let (status, code) = match err {
        StorageError::Exists { .. } => (StatusCode::CONFLICT, "RESOURCE.EXISTS"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL.ERROR"),
    };
    error_response(status, code, err.to_string())
}

/// 运行实例应用失败：配置本身不可用，按请求错误处理
pub fn control_error(err: ControlError) -> Response {
    let code = match &err {
        ControlError::Script(_) => "SCRIPT.INVALID",
        ControlError::UnknownDecoder(_) | ControlError::UnknownScript(_) => "DECODER.UNKNOWN",
        ControlError::Listen(_) | ControlError::Push(_) | ControlError::Invalid(_) => {
            "CONFIG.INVALID"
        }
    };
    error_response(StatusCode::BAD_REQUEST, code, err.to_string())
}

fn error_response(status: StatusCode, code: &str, message: impl Into<String>) -> Response {
    (status, Json(ApiResponse::<()>::error(code, message.into()))).into_response()
}

/// ListenerState 转 ListenerStatusDto
pub fn listener_status_to_dto(id: i64, state: ListenerState) -> ListenerStatusDto {
    let (state, error) = match state {
        ListenerState::Running => ("running", None),
        ListenerState::Stopped => ("stopped", None),
        ListenerState::Failed(reason) => ("failed", Some(reason)),
    };
    ListenerStatusDto {
        id,
        state: state.to_string(),
        error,
    }
}
