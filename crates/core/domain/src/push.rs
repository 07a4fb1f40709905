use crate::listener::MqttBrokerConfig;
use serde::{Deserialize, Serialize};

/// 推送目标配置。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushConfig {
    /// ≤ 0 表示由存储分配
    #[serde(default)]
    pub id: i64,
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// 重试次数（≤0 时仍至少尝试一次）
    #[serde(default)]
    pub retry: i32,
    /// 重试间隔（毫秒）
    #[serde(default)]
    pub retry_interval_ms: u64,
    pub kind: PushKind,
}

fn default_enabled() -> bool {
    true
}

/// 推送目标类型。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PushKind {
    /// TCP 持久连接，按行写 JSON
    Tcp { address: String },
    /// WebSocket 持久连接，写 JSON 文本帧
    #[serde(rename = "websocket")]
    WebSocket { url: String },
    /// 发布到 MQTT 主题
    Mqtt {
        broker: MqttBrokerConfig,
        topic: String,
    },
}

impl PushKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Tcp { .. } => "tcp",
            Self::WebSocket { .. } => "websocket",
            Self::Mqtt { .. } => "mqtt",
        }
    }
}
