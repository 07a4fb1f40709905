//! 解析脚本内存存储实现

use super::table::{Record, Table};
use crate::error::StorageError;
use crate::traits::DecodeScriptStore;
use domain::DecodeScript;

impl Record for DecodeScript {
    const KIND: &'static str = "script";

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }
}

pub struct InMemoryDecodeScriptStore {
    table: Table<DecodeScript>,
}

impl InMemoryDecodeScriptStore {
    pub fn new() -> Self {
        Self {
            table: Table::new(),
        }
    }
}

impl Default for InMemoryDecodeScriptStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl DecodeScriptStore for InMemoryDecodeScriptStore {
    async fn list_scripts(&self) -> Result<Vec<DecodeScript>, StorageError> {
        self.table.list()
    }

    async fn find_script(&self, id: i64) -> Result<Option<DecodeScript>, StorageError> {
        self.table.find(id)
    }

    async fn create_script(&self, record: DecodeScript) -> Result<DecodeScript, StorageError> {
        self.table.create(record)
    }

    async fn update_script(
        &self,
        id: i64,
        record: DecodeScript,
    ) -> Result<Option<DecodeScript>, StorageError> {
        self.table.update(id, record)
    }

    async fn delete_script(&self, id: i64) -> Result<bool, StorageError> {
        self.table.delete(id)
    }
}
