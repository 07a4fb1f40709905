//! 管理 API 的 DTO 与响应契约。
//!
//! 配置记录（监听 / 脚本 / 推送）直接使用 `domain` 中的结构体序列化，
//! 这里只放管理接口特有的请求体与视图。

use serde::{Deserialize, Serialize};

/// 标准 API 响应封装。
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

/// 失败响应的错误体。
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError {
                code: code.into(),
                message: message.into(),
            }),
        }
    }
}

/// 健康检查响应。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthDto {
    pub ok: bool,
    pub running_listeners: usize,
}

/// 解析器目录条目。
#[derive(Debug, Serialize)]
pub struct DecoderDto {
    pub key: String,
    pub name: String,
}

/// 解析脚本创建 / 更新请求体。
#[derive(Debug, Deserialize)]
pub struct ScriptRequest {
    pub name: String,
    pub script: String,
}

/// 监听器运行状态视图。
///
/// `state` 为 `running` / `stopped` / `failed`，失败时 `error` 携带原因。
#[derive(Debug, Serialize)]
pub struct ListenerStatusDto {
    pub id: i64,
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// 流水线计数指标快照。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshotDto {
    pub payloads_received: u64,
    pub payloads_enqueued: u64,
    pub enqueue_overload: u64,
    pub enqueue_cancelled: u64,
    pub decode_success: u64,
    pub decode_failure: u64,
    pub push_success: u64,
    pub push_failure: u64,
    pub push_dropped: u64,
    pub listener_failures: u64,
}
