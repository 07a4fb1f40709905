//! 运行实例注册表：(group, key) → 运行中的对象。
//!
//! 注册表只持有运行句柄，不负责持久化；替换时不会关闭被替换的对象，
//! 由调用方自行决定旧实例的收尾。

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

/// 注册表中的值。
pub type Entry = Arc<dyn Any + Send + Sync>;

/// 变更类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Set,
    Removed,
}

/// 变更通知。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEvent {
    pub group: String,
    pub key: String,
    pub change: Change,
}

type Callback = Arc<dyn Fn(&RegistryEvent) + Send + Sync>;

#[derive(Default)]
struct Group {
    entries: RwLock<HashMap<String, Entry>>,
}

/// 分组注册表；每个分组独立加锁。
#[derive(Default)]
pub struct Registry {
    groups: RwLock<HashMap<String, Arc<Group>>>,
    callbacks: RwLock<Vec<Callback>>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("groups", &self.groups())
            .finish()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置（或替换）一个条目，返回被替换的旧值。
    pub fn set(&self, group: &str, key: &str, value: Entry) -> Option<Entry> {
        let previous = {
            let group = self.group_or_insert(group);
            let mut entries = write(&group.entries);
            entries.insert(key.to_string(), value)
        };
        debug!(target: "gateway.registry", group, key, replaced = previous.is_some(), "registry_set");
        self.notify(group, key, Change::Set);
        previous
    }

    pub fn get(&self, group: &str, key: &str) -> Option<Entry> {
        let group = self.group(group)?;
        let entries = read(&group.entries);
        entries.get(key).cloned()
    }

    /// 按具体类型取出条目；类型不符返回 None。
    pub fn get_as<T: Any + Send + Sync>(&self, group: &str, key: &str) -> Option<Arc<T>> {
        self.get(group, key)?.downcast::<T>().ok()
    }

    pub fn remove(&self, group: &str, key: &str) -> Option<Entry> {
        let removed = {
            let group = self.group(group)?;
            let mut entries = write(&group.entries);
            entries.remove(key)
        };
        if removed.is_some() {
            debug!(target: "gateway.registry", group, key, "registry_removed");
            self.notify(group, key, Change::Removed);
        }
        removed
    }

    /// 分组内全部 key（已排序）。
    pub fn keys(&self, group: &str) -> Vec<String> {
        let Some(group) = self.group(group) else {
            return Vec::new();
        };
        let entries = read(&group.entries);
        let mut keys: Vec<String> = entries.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn groups(&self) -> Vec<String> {
        let groups = read(&self.groups);
        let mut names: Vec<String> = groups.keys().cloned().collect();
        names.sort();
        names
    }

    /// 注册变更回调；回调在锁释放后同步调用。
    pub fn on_change<F>(&self, callback: F)
    where
        F: Fn(&RegistryEvent) + Send + Sync + 'static,
    {
        write(&self.callbacks).push(Arc::new(callback));
    }

    fn group(&self, name: &str) -> Option<Arc<Group>> {
        read(&self.groups).get(name).cloned()
    }

    fn group_or_insert(&self, name: &str) -> Arc<Group> {
        if let Some(group) = self.group(name) {
            return group;
        }
        write(&self.groups)
            .entry(name.to_string())
            .or_default()
            .clone()
    }

    fn notify(&self, group: &str, key: &str, change: Change) {
        let callbacks: Vec<Callback> = read(&self.callbacks).clone();
        if callbacks.is_empty() {
            return;
        }
        let event = RegistryEvent {
            group: group.to_string(),
            key: key.to_string(),
            change,
        };
        for callback in callbacks {
            callback(&event);
        }
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Closable {
        closed: AtomicBool,
    }

    #[test]
    fn replace_does_not_close_previous_value() {
        let registry = Registry::new();
        let first = Arc::new(Closable {
            closed: AtomicBool::new(false),
        });
        registry.set("listener", "1", first.clone());

        let second = Arc::new(Closable {
            closed: AtomicBool::new(false),
        });
        let previous = registry.set("listener", "1", second.clone()).expect("previous");

        assert!(!first.closed.load(Ordering::SeqCst));
        let previous = previous.downcast::<Closable>().expect("type");
        assert!(Arc::ptr_eq(&previous, &first));
        let current = registry.get_as::<Closable>("listener", "1").expect("current");
        assert!(Arc::ptr_eq(&current, &second));
    }

    #[test]
    fn groups_are_independent() {
        let registry = Registry::new();
        registry.set("listener", "1", Arc::new(1u32));
        registry.set("decoder", "1", Arc::new("script".to_string()));

        assert_eq!(registry.get_as::<u32>("listener", "1").as_deref(), Some(&1));
        assert!(registry.get_as::<u32>("decoder", "1").is_none());
        assert_eq!(registry.groups(), vec!["decoder", "listener"]);

        assert!(registry.remove("listener", "1").is_some());
        assert!(registry.get("listener", "1").is_none());
        assert!(registry.keys("listener").is_empty());
        assert!(registry.remove("missing", "1").is_none());
    }

    #[test]
    fn on_change_sees_set_and_remove() {
        let registry = Arc::new(Registry::new());
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let inner = registry.clone();
        registry.on_change(move |event| {
            // 回调中可以重入注册表
            let _ = inner.keys(&event.group);
            sink.lock().expect("lock").push(event.clone());
        });

        registry.set("pusher", "3", Arc::new(()));
        registry.set("pusher", "3", Arc::new(()));
        registry.remove("pusher", "3");
        registry.remove("pusher", "3");

        let events = events.lock().expect("lock");
        let changes: Vec<Change> = events.iter().map(|event| event.change).collect();
        assert_eq!(changes, vec![Change::Set, Change::Set, Change::Removed]);
        assert_eq!(events[0].key, "3");
    }
}
