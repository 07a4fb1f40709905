//! 存储接口 Trait 定义
//!
//! 三类配置记录各一个接口，签名保持一致：
//! - ListenerStore：监听配置
//! - DecodeScriptStore：解析脚本
//! - PushStore：推送配置
//!
//! `create` 在记录 ID ≤ 0 时分配新 ID；`update` 与 `delete` 对不存在的 ID
//! 分别返回 `None` / `false`。

use crate::error::StorageError;
use async_trait::async_trait;
use domain::{DecodeScript, ListenerConfig, PushConfig};

/// 监听配置存储接口
#[async_trait]
pub trait ListenerStore: Send + Sync {
    async fn list_listeners(&self) -> Result<Vec<ListenerConfig>, StorageError>;

    async fn find_listener(&self, id: i64) -> Result<Option<ListenerConfig>, StorageError>;

    async fn create_listener(&self, record: ListenerConfig) -> Result<ListenerConfig, StorageError>;

    /// 整条替换（ID 以参数为准）
    async fn update_listener(
        &self,
        id: i64,
        record: ListenerConfig,
    ) -> Result<Option<ListenerConfig>, StorageError>;

    /// 仅切换启用状态
    async fn set_listener_enabled(
        &self,
        id: i64,
        enabled: bool,
    ) -> Result<Option<ListenerConfig>, StorageError>;

    async fn delete_listener(&self, id: i64) -> Result<bool, StorageError>;
}

/// 解析脚本存储接口
#[async_trait]
pub trait DecodeScriptStore: Send + Sync {
    async fn list_scripts(&self) -> Result<Vec<DecodeScript>, StorageError>;

    async fn find_script(&self, id: i64) -> Result<Option<DecodeScript>, StorageError>;

    async fn create_script(&self, record: DecodeScript) -> Result<DecodeScript, StorageError>;

    async fn update_script(
        &self,
        id: i64,
        record: DecodeScript,
    ) -> Result<Option<DecodeScript>, StorageError>;

    async fn delete_script(&self, id: i64) -> Result<bool, StorageError>;
}

/// 推送配置存储接口
#[async_trait]
pub trait PushStore: Send + Sync {
    async fn list_pushes(&self) -> Result<Vec<PushConfig>, StorageError>;

    async fn find_push(&self, id: i64) -> Result<Option<PushConfig>, StorageError>;

    async fn create_push(&self, record: PushConfig) -> Result<PushConfig, StorageError>;

    async fn update_push(
        &self,
        id: i64,
        record: PushConfig,
    ) -> Result<Option<PushConfig>, StorageError>;

    async fn delete_push(&self, id: i64) -> Result<bool, StorageError>;
}
