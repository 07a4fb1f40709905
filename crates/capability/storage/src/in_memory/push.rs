//! 推送配置内存存储实现

use super::table::{Record, Table};
use crate::error::StorageError;
use crate::traits::PushStore;
use domain::PushConfig;

impl Record for PushConfig {
    const KIND: &'static str = "push";

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }
}

pub struct InMemoryPushStore {
    table: Table<PushConfig>,
}

impl InMemoryPushStore {
    pub fn new() -> Self {
        Self {
            table: Table::new(),
        }
    }
}

impl Default for InMemoryPushStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl PushStore for InMemoryPushStore {
    async fn list_pushes(&self) -> Result<Vec<PushConfig>, StorageError> {
        self.table.list()
    }

    async fn find_push(&self, id: i64) -> Result<Option<PushConfig>, StorageError> {
        self.table.find(id)
    }

    async fn create_push(&self, record: PushConfig) -> Result<PushConfig, StorageError> {
        self.table.create(record)
    }

    async fn update_push(
        &self,
        id: i64,
        record: PushConfig,
    ) -> Result<Option<PushConfig>, StorageError> {
        self.table.update(id, record)
    }

    async fn delete_push(&self, id: i64) -> Result<bool, StorageError> {
        self.table.delete(id)
    }
}
