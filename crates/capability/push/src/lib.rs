//! # 推送能力模块
//!
//! 把解析后的消息投递到下游：
//! - **TCP**：持久连接，逐行 JSON
//! - **WebSocket**：持久连接，JSON 文本帧
//! - **MQTT**：发布到指定主题
//!
//! 具体下游只需实现 [`AnyWriter`]，由 [`AnyWriterPusher`] 适配为 [`Pusher`]，
//! 再由 [`Retry`] 包装重试。

mod error;
mod mqtt;
mod retry;
mod tcp;
mod websocket;

pub use error::PushError;
pub use mqtt::MqttPusher;
pub use retry::Retry;
pub use tcp::TcpPusher;
pub use websocket::WebSocketPusher;

use async_trait::async_trait;
use domain::{OutboundMessage, PushConfig, PushKind};
use std::sync::Arc;
use std::time::Duration;

/// 推送器契约。
#[async_trait]
pub trait Pusher: Send + Sync {
    async fn push(&self, message: &OutboundMessage) -> Result<(), PushError>;
}

/// 可写入任意 JSON 值的下游。
#[async_trait]
pub trait AnyWriter: Send + Sync {
    async fn write_any(&self, value: serde_json::Value) -> Result<(), PushError>;
}

/// 把 [`AnyWriter`] 适配为 [`Pusher`]。
#[derive(Debug)]
pub struct AnyWriterPusher<W> {
    writer: W,
}

impl<W: AnyWriter> AnyWriterPusher<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }
}

#[async_trait]
impl<W: AnyWriter> Pusher for AnyWriterPusher<W> {
    async fn push(&self, message: &OutboundMessage) -> Result<(), PushError> {
        self.writer.write_any(message.to_value()).await
    }
}

/// 单次写入超时（MQTT 为单次发布入队）。
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// 按配置构建推送器（已包装重试）。
pub fn build_pusher(config: &PushConfig) -> Result<Arc<dyn Pusher>, PushError> {
    let inner: Arc<dyn Pusher> = match &config.kind {
        PushKind::Tcp { address } => Arc::new(AnyWriterPusher::new(TcpPusher::new(
            address.clone(),
            WRITE_TIMEOUT,
        ))),
        PushKind::WebSocket { url } => Arc::new(AnyWriterPusher::new(WebSocketPusher::new(
            url.clone(),
            WRITE_TIMEOUT,
        ))),
        PushKind::Mqtt { broker, topic } => {
            Arc::new(AnyWriterPusher::new(MqttPusher::connect(broker, topic, WRITE_TIMEOUT)?))
        }
    };
    Ok(Arc::new(Retry::new(
        inner,
        config.retry,
        Duration::from_millis(config.retry_interval_ms),
    )
    .with_name(format!("{}#{}", config.kind.name(), config.id))))
}
