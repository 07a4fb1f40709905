//! 网关运行配置加载。

use std::env;
use std::time::Duration;

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
}

/// 网关运行配置。
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// 管理 API 监听地址
    pub http_addr: String,
    /// 每条流水线的队列容量
    pub queue_capacity: usize,
    /// 入队超时（背压阈值）
    pub enqueue_timeout_ms: u64,
    /// 监听器停止宽限期
    pub shutdown_grace_ms: u64,
    /// 单次脚本调用的最长执行时间
    pub script_timeout_ms: u64,
    /// 脚本解释器堆上限（MB）
    pub script_heap_mb: usize,
    /// 引导配置文件（可选）
    pub bootstrap_file: Option<String>,
    /// 启动时自动拉起已启用的监听器
    pub autostart: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            http_addr: "127.0.0.1:8080".to_string(),
            queue_capacity: 1024,
            enqueue_timeout_ms: 5000,
            shutdown_grace_ms: 5000,
            script_timeout_ms: 1000,
            script_heap_mb: 64,
            bootstrap_file: None,
            autostart: true,
        }
    }
}

impl GatewayConfig {
    /// 从环境变量读取配置。
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let http_addr = env::var("GATEWAY_HTTP_ADDR").unwrap_or(defaults.http_addr);
        let queue_capacity =
            read_u64_with_default("GATEWAY_QUEUE_CAPACITY", defaults.queue_capacity as u64)?;
        if queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "GATEWAY_QUEUE_CAPACITY".to_string(),
                "0".to_string(),
            ));
        }
        let enqueue_timeout_ms =
            read_u64_with_default("GATEWAY_ENQUEUE_TIMEOUT_MS", defaults.enqueue_timeout_ms)?;
        let shutdown_grace_ms =
            read_u64_with_default("GATEWAY_SHUTDOWN_GRACE_MS", defaults.shutdown_grace_ms)?;
        let script_timeout_ms =
            read_u64_with_default("GATEWAY_SCRIPT_TIMEOUT_MS", defaults.script_timeout_ms)?;
        let script_heap_mb =
            read_u64_with_default("GATEWAY_SCRIPT_HEAP_MB", defaults.script_heap_mb as u64)?;
        let bootstrap_file = read_optional("GATEWAY_BOOTSTRAP_FILE");
        let autostart = read_bool_with_default("GATEWAY_AUTOSTART", defaults.autostart);

        Ok(Self {
            http_addr,
            queue_capacity: queue_capacity as usize,
            enqueue_timeout_ms,
            shutdown_grace_ms,
            script_timeout_ms,
            script_heap_mb: script_heap_mb as usize,
            bootstrap_file,
            autostart,
        })
    }

    pub fn enqueue_timeout(&self) -> Duration {
        Duration::from_millis(self.enqueue_timeout_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    pub fn script_timeout(&self) -> Duration {
        Duration::from_millis(self.script_timeout_ms)
    }
}

fn read_u64_with_default(key: &str, default: u64) -> Result<u64, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u64>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_optional(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.is_empty() => Some(value),
        _ => None,
    }
}

fn read_bool_with_default(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(value) => matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "on"),
        Err(_) => default,
    }
}
