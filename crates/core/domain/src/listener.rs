//! 监听器配置记录。

use serde::{Deserialize, Serialize};

/// 监听器配置。
///
/// 每条配置至多对应一个运行实例；`enabled` 的切换由监管层负责启停实例。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListenerConfig {
    /// ≤ 0 表示由存储分配
    #[serde(default)]
    pub id: i64,
    pub name: String,
    /// 绑定地址（默认 0.0.0.0）
    #[serde(default = "default_host")]
    pub host: String,
    /// 绑定端口（HTTP / TCP 使用）
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub enabled: bool,
    /// 有序路由列表；每个路由绑定一个解析器 key
    #[serde(default)]
    pub routes: Vec<RouteNode>,
    #[serde(default)]
    pub kind: ListenerKind,
    /// 推送目标（PushConfig ID）
    #[serde(default)]
    pub push_ids: Vec<i64>,
}

impl ListenerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// 路由在运行时的匹配键。
    ///
    /// HTTP 路径统一为带前导 `/` 的形式（与请求匹配到的路径一致），
    /// 其它类型（MQTT 主题过滤器等）原样使用。
    pub fn route_key(&self, path: &str) -> String {
        match self.kind {
            ListenerKind::Http => {
                let trimmed = path.trim();
                if trimmed.starts_with('/') {
                    trimmed.to_string()
                } else {
                    format!("/{trimmed}")
                }
            }
            _ => path.to_string(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

/// 路由节点：一个子路径（或主题过滤器）及其解析器。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteNode {
    #[serde(default)]
    pub name: String,
    pub path: String,
    /// 解析器 key（如 `pass`、`modbus_tcp`、`script12`）
    #[serde(default = "default_decoder")]
    pub decoder: String,
}

impl RouteNode {
    pub fn new(path: impl Into<String>, decoder: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            name: path.clone(),
            path,
            decoder: decoder.into(),
        }
    }
}

fn default_decoder() -> String {
    "pass".to_string()
}

/// 监听器类型。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ListenerKind {
    Http,
    Tcp {
        #[serde(default)]
        split: SplitConfig,
    },
    Mqtt(MqttBrokerConfig),
    /// 脚本监听器：周期调用脚本中的 `poll()`
    Script {
        script_id: i64,
        #[serde(default = "default_poll_interval")]
        interval_ms: u64,
    },
}

impl Default for ListenerKind {
    fn default() -> Self {
        Self::Http
    }
}

impl ListenerKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Tcp { .. } => "tcp",
            Self::Mqtt(_) => "mqtt",
            Self::Script { .. } => "script",
        }
    }
}

fn default_poll_interval() -> u64 {
    1000
}

/// TCP 分包方式。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SplitConfig {
    /// 每次读取到的数据即为一帧
    Raw {
        #[serde(default = "default_max_frame")]
        max_frame: usize,
    },
    /// 按分隔符切分
    Delimiter {
        delimiter: String,
        /// 是否在帧中保留分隔符
        #[serde(default)]
        keep: bool,
        #[serde(default = "default_max_frame")]
        max_frame: usize,
    },
    /// 固定长度
    FixedLength { length: usize },
    /// 长度字段：`offset` 处 `width` 字节记录后续长度，帧长 = offset + width + len + adjust
    LengthPrefixed {
        width: u8,
        #[serde(default)]
        offset: usize,
        #[serde(default)]
        adjust: i64,
        #[serde(default)]
        little_endian: bool,
        #[serde(default = "default_max_frame")]
        max_frame: usize,
    },
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self::Delimiter {
            delimiter: "\n".to_string(),
            keep: false,
            max_frame: default_max_frame(),
        }
    }
}

fn default_max_frame() -> usize {
    64 * 1024
}

/// MQTT Broker 连接配置（监听与推送共用）。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MqttBrokerConfig {
    pub host: String,
    #[serde(default = "default_mqtt_port")]
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub qos: u8,
}

fn default_mqtt_port() -> u16 {
    1883
}
