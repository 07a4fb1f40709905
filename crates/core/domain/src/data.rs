use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// 解析结果：字段名 → 任意类型值，不做 schema 约束。
pub type DecodedMessage = serde_json::Map<String, serde_json::Value>;

/// 队列元素：监听器交给流水线的一条原始载荷。
#[derive(Debug, Clone)]
pub struct QueueItem {
    /// 产生该载荷的监听器 ID
    pub listener_id: i64,
    /// 到达路由（HTTP 路径 / MQTT 主题过滤器），TCP 与脚本监听器为空
    pub route: Option<String>,
    pub payload: Bytes,
    pub received_at_ms: i64,
}

impl QueueItem {
    pub fn new(listener_id: i64, route: Option<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            listener_id,
            route,
            payload: payload.into(),
            received_at_ms: now_epoch_ms(),
        }
    }
}

/// 推送到下游的自描述消息帧。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub listener_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
    pub received_at_ms: i64,
    /// 原始载荷（十六进制）
    pub raw: String,
    /// 解析字段（透传解析器为空对象）
    pub data: DecodedMessage,
}

impl OutboundMessage {
    pub fn from_item(item: &QueueItem, data: DecodedMessage) -> Self {
        Self {
            listener_id: item.listener_id,
            route: item.route.clone(),
            received_at_ms: item.received_at_ms,
            raw: hex::encode(&item.payload),
            data,
        }
    }

    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// 解析器目录条目。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoderInfo {
    pub key: String,
    pub name: String,
}

impl DecoderInfo {
    pub fn new(key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
        }
    }
}

/// 获取当前时间戳（毫秒）
pub fn now_epoch_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
