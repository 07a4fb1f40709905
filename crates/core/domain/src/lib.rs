//! 网关领域模型：监听、脚本、推送配置记录与流水线数据结构。
//!
//! 配置记录（`ListenerConfig` / `DecodeScript` / `PushConfig`）由管理 API 创建与更新，
//! 核心只消费它们并据此启动、重启或停止对应的运行实例。

pub mod data;
pub mod listener;
pub mod push;
pub mod script;

pub use data::{DecodedMessage, DecoderInfo, OutboundMessage, QueueItem, now_epoch_ms};
pub use listener::{ListenerConfig, ListenerKind, MqttBrokerConfig, RouteNode, SplitConfig};
pub use push::{PushConfig, PushKind};
pub use script::DecodeScript;
