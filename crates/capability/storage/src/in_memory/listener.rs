//! 监听配置内存存储实现

use super::table::{Record, Table};
use crate::error::StorageError;
use crate::traits::ListenerStore;
use domain::ListenerConfig;

impl Record for ListenerConfig {
    const KIND: &'static str = "listener";

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }
}

pub struct InMemoryListenerStore {
    table: Table<ListenerConfig>,
}

impl InMemoryListenerStore {
    pub fn new() -> Self {
        Self {
            table: Table::new(),
        }
    }
}

impl Default for InMemoryListenerStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ListenerStore for InMemoryListenerStore {
    async fn list_listeners(&self) -> Result<Vec<ListenerConfig>, StorageError> {
        self.table.list()
    }

    async fn find_listener(&self, id: i64) -> Result<Option<ListenerConfig>, StorageError> {
        self.table.find(id)
    }

    async fn create_listener(&self, record: ListenerConfig) -> Result<ListenerConfig, StorageError> {
        self.table.create(record)
    }

    async fn update_listener(
        &self,
        id: i64,
        record: ListenerConfig,
    ) -> Result<Option<ListenerConfig>, StorageError> {
        self.table.update(id, record)
    }

    async fn set_listener_enabled(
        &self,
        id: i64,
        enabled: bool,
    ) -> Result<Option<ListenerConfig>, StorageError> {
        self.table.modify(id, |record| record.enabled = enabled)
    }

    async fn delete_listener(&self, id: i64) -> Result<bool, StorageError> {
        self.table.delete(id)
    }
}
