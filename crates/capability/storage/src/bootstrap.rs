//! 引导文件：启动时一次性载入的初始配置记录。
//!
//! ```json
//! { "scripts": [...], "pushes": [...], "listeners": [...] }
//! ```

use crate::error::StorageError;
use crate::traits::{DecodeScriptStore, ListenerStore, PushStore};
use domain::{DecodeScript, ListenerConfig, PushConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Bootstrap {
    #[serde(default)]
    pub scripts: Vec<DecodeScript>,
    #[serde(default)]
    pub pushes: Vec<PushConfig>,
    #[serde(default)]
    pub listeners: Vec<ListenerConfig>,
}

impl Bootstrap {
    pub fn from_json(text: &str) -> Result<Self, StorageError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// 写入各存储；ID 冲突时报错。
    pub async fn load_into(
        self,
        listeners: &dyn ListenerStore,
        scripts: &dyn DecodeScriptStore,
        pushes: &dyn PushStore,
    ) -> Result<(), StorageError> {
        let counts = (self.scripts.len(), self.pushes.len(), self.listeners.len());
        for script in self.scripts {
            scripts.create_script(script).await?;
        }
        for push in self.pushes {
            pushes.create_push(push).await?;
        }
        for listener in self.listeners {
            listeners.create_listener(listener).await?;
        }
        info!(
            target: "gateway.storage",
            scripts = counts.0,
            pushes = counts.1,
            listeners = counts.2,
            "bootstrap_loaded"
        );
        Ok(())
    }
}
