//! 经注册表间接引用的解析器与推送器。
//!
//! 运行中的流水线只持有 key，每次调用时再从注册表取当前条目，
//! 因此脚本或推送配置更新后无需重启监听器。

use crate::{GROUP_DECODER, GROUP_PUSHER, PusherEntry, ScriptEntry};
use async_trait::async_trait;
use domain::{DecodedMessage, OutboundMessage};
use gateway_decode::{DecodeError, Decoder};
use gateway_push::{PushError, Pusher};
use gateway_registry::Registry;
use std::sync::Arc;
use tracing::debug;

pub(crate) struct RegistryDecoder {
    registry: Arc<Registry>,
    key: String,
}

impl RegistryDecoder {
    pub(crate) fn new(registry: Arc<Registry>, key: String) -> Self {
        Self { registry, key }
    }
}

#[async_trait]
impl Decoder for RegistryDecoder {
    async fn decode(&self, payload: &[u8]) -> Result<DecodedMessage, DecodeError> {
        let decoder = self
            .registry
            .get_as::<ScriptEntry>(GROUP_DECODER, &self.key)
            .and_then(|entry| entry.decoder.clone())
            .ok_or_else(|| DecodeError::UnknownDecoder(self.key.clone()))?;
        decoder.decode(payload).await
    }
}

pub(crate) struct RegistryPusher {
    registry: Arc<Registry>,
    id: i64,
}

impl RegistryPusher {
    pub(crate) fn new(registry: Arc<Registry>, id: i64) -> Self {
        Self { registry, id }
    }
}

#[async_trait]
impl Pusher for RegistryPusher {
    /// 推送配置不存在或已禁用时跳过。
    async fn push(&self, message: &OutboundMessage) -> Result<(), PushError> {
        let Some(entry) = self
            .registry
            .get_as::<PusherEntry>(GROUP_PUSHER, &self.id.to_string())
        else {
            debug!(target: "gateway.control", push_id = self.id, "pusher_absent");
            return Ok(());
        };
        entry.pusher.push(message).await
    }
}
