//! 按 ID 索引的记录表，三个内存存储共用。

use crate::error::StorageError;
use std::collections::BTreeMap;
use std::sync::RwLock;

pub(crate) trait Record: Clone {
    const KIND: &'static str;

    fn id(&self) -> i64;

    fn set_id(&mut self, id: i64);
}

pub(crate) struct Table<T> {
    rows: RwLock<BTreeMap<i64, T>>,
}

impl<T: Record> Table<T> {
    pub(crate) fn new() -> Self {
        Self {
            rows: RwLock::new(BTreeMap::new()),
        }
    }

    /// 按 ID 升序
    pub(crate) fn list(&self) -> Result<Vec<T>, StorageError> {
        let rows = self.rows.read().map_err(|_| StorageError::Lock)?;
        Ok(rows.values().cloned().collect())
    }

    pub(crate) fn find(&self, id: i64) -> Result<Option<T>, StorageError> {
        let rows = self.rows.read().map_err(|_| StorageError::Lock)?;
        Ok(rows.get(&id).cloned())
    }

    pub(crate) fn create(&self, mut record: T) -> Result<T, StorageError> {
        let mut rows = self.rows.write().map_err(|_| StorageError::Lock)?;
        if record.id() <= 0 {
            let next = rows.keys().next_back().copied().unwrap_or(0) + 1;
            record.set_id(next);
        }
        if rows.contains_key(&record.id()) {
            return Err(StorageError::Exists {
                kind: T::KIND,
                id: record.id(),
            });
        }
        rows.insert(record.id(), record.clone());
        Ok(record)
    }

    pub(crate) fn update(&self, id: i64, mut record: T) -> Result<Option<T>, StorageError> {
        let mut rows = self.rows.write().map_err(|_| StorageError::Lock)?;
        let Some(row) = rows.get_mut(&id) else {
            return Ok(None);
        };
        record.set_id(id);
        *row = record.clone();
        Ok(Some(record))
    }

    pub(crate) fn modify<F>(&self, id: i64, change: F) -> Result<Option<T>, StorageError>
    where
        F: FnOnce(&mut T),
    {
        let mut rows = self.rows.write().map_err(|_| StorageError::Lock)?;
        let Some(row) = rows.get_mut(&id) else {
            return Ok(None);
        };
        change(row);
        Ok(Some(row.clone()))
    }

    pub(crate) fn delete(&self, id: i64) -> Result<bool, StorageError> {
        let mut rows = self.rows.write().map_err(|_| StorageError::Lock)?;
        Ok(rows.remove(&id).is_some())
    }
}
