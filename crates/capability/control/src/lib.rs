//! # 运行监管
//!
//! [`Supervisor`] 把配置记录变成运行实例：
//! - 监听器：每条配置至多一个实例（监听任务 + 处理流水线），重复应用即替换
//! - 脚本：编译后登记到注册表 `decoder` 分组，并同步解析器目录
//! - 推送：构建带重试的推送器，登记到 `pusher` 分组
//!
//! 监管器是显式传递的上下文对象，不使用全局单例。

mod error;
mod resolve;

pub use error::ControlError;

use domain::{DecodeScript, DecoderInfo, ListenerConfig, ListenerKind, PushConfig};
use gateway_config::GatewayConfig;
use gateway_decode::{BuiltinDecoder, Decoder, DecoderCatalog, ScriptDecoder};
use gateway_ingest::{Listener, POLL_FN, build_listener};
use gateway_pipeline::{DecoderTable, Pipeline};
use gateway_push::{Pusher, build_pusher};
use gateway_registry::Registry;
use gateway_script::{Program, ScriptError, ScriptHost};
use gateway_telemetry::record_listener_failure;
use resolve::{RegistryDecoder, RegistryPusher};
use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, info_span, warn};

pub const GROUP_LISTENER: &str = "listener";
pub const GROUP_DECODER: &str = "decoder";
pub const GROUP_PUSHER: &str = "pusher";

/// 监管参数。
#[derive(Debug, Clone)]
pub struct SupervisorSettings {
    pub queue_capacity: usize,
    pub enqueue_timeout: Duration,
    pub shutdown_grace: Duration,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            enqueue_timeout: gateway_queue::DEFAULT_ENQUEUE_TIMEOUT,
            shutdown_grace: gateway_ingest::DEFAULT_SHUTDOWN_GRACE,
        }
    }
}

impl From<&GatewayConfig> for SupervisorSettings {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            queue_capacity: config.queue_capacity,
            enqueue_timeout: config.enqueue_timeout(),
            shutdown_grace: config.shutdown_grace(),
        }
    }
}

/// 监听器运行状态。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "error", rename_all = "snake_case")]
pub enum ListenerState {
    Running,
    Stopped,
    Failed(String),
}

/// 注册表 `decoder` 分组中的脚本条目。
pub struct ScriptEntry {
    pub script: DecodeScript,
    pub program: Program,
    /// 脚本定义了 `decode` 时才可作为解析器
    pub decoder: Option<Arc<ScriptDecoder>>,
}

/// 注册表 `pusher` 分组中的推送条目。
pub struct PusherEntry {
    pub config: PushConfig,
    pub pusher: Arc<dyn Pusher>,
}

/// 注册表 `listener` 分组中的运行实例。
pub struct ListenerHandle {
    pub config: ListenerConfig,
    listener: Arc<dyn Listener>,
    cancel: CancellationToken,
    state: Arc<RwLock<ListenerState>>,
    tasks: Mutex<Option<(JoinHandle<()>, JoinHandle<()>)>>,
}

impl ListenerHandle {
    pub fn state(&self) -> ListenerState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn stop(&self, grace: Duration) {
        if let Err(err) = self.listener.close().await {
            warn!(target: "gateway.control", listener_id = self.config.id, error = %err, "listener_close_failed");
        }
        self.cancel.cancel();

        let tasks = self
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some((listener_task, pipeline_task)) = tasks else {
            return;
        };
        // 监听任务自身受宽限期约束，这里再留出余量
        let deadline = grace + Duration::from_secs(1);
        if tokio::time::timeout(deadline, listener_task).await.is_err() {
            warn!(target: "gateway.control", listener_id = self.config.id, "listener_stop_timeout");
        }
        if tokio::time::timeout(deadline, pipeline_task).await.is_err() {
            warn!(target: "gateway.control", listener_id = self.config.id, "pipeline_drain_timeout");
        }
    }
}

/// 运行监管器。
pub struct Supervisor {
    registry: Arc<Registry>,
    scripts: ScriptHost,
    catalog: Arc<DecoderCatalog>,
    settings: SupervisorSettings,
    /// 串行化监听实例的启停，保证同一时刻每个 id 至多一个实例
    lifecycle: tokio::sync::Mutex<()>,
}

impl Supervisor {
    pub fn new(settings: SupervisorSettings, scripts: ScriptHost) -> Self {
        let registry = Arc::new(Registry::new());
        registry.on_change(|event| {
            tracing::debug!(
                target: "gateway.control",
                group = %event.group,
                key = %event.key,
                change = ?event.change,
                "registry_changed"
            );
        });
        Self {
            registry,
            scripts,
            catalog: Arc::new(DecoderCatalog::new()),
            settings,
            lifecycle: tokio::sync::Mutex::new(()),
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn catalog(&self) -> &Arc<DecoderCatalog> {
        &self.catalog
    }

    pub fn settings(&self) -> &SupervisorSettings {
        &self.settings
    }

    /// 解析器目录：静态条目 + 已登记的脚本解析器。
    pub fn decoders(&self) -> Vec<DecoderInfo> {
        self.catalog.list()
    }

    /// 创建或替换监听实例；配置未启用时只停止旧实例。
    ///
    /// 新配置校验失败时旧实例保持运行。
    pub async fn apply_listener(&self, config: ListenerConfig) -> Result<ListenerState, ControlError> {
        let _lifecycle = self.lifecycle.lock().await;
        if !config.enabled {
            self.stop_instance(config.id).await;
            return Ok(ListenerState::Stopped);
        }

        let decoders = self.decoder_table(&config)?;
        let pushers: Vec<Arc<dyn Pusher>> = config
            .push_ids
            .iter()
            .map(|id| Arc::new(RegistryPusher::new(self.registry.clone(), *id)) as Arc<dyn Pusher>)
            .collect();
        let program = match &config.kind {
            ListenerKind::Script { script_id, .. } => Some(self.poll_program(*script_id)?),
            _ => None,
        };
        let listener = build_listener(&config, self.settings.shutdown_grace, program)?;
        self.stop_instance(config.id).await;

        let (queue, receiver) =
            gateway_queue::channel(self.settings.queue_capacity, self.settings.enqueue_timeout);
        let span = info_span!(
            target: "gateway.control",
            "listener",
            listener_id = config.id,
            listener_name = %config.name,
            kind = listener.kind()
        );
        let pipeline_task = tokio::spawn(
            Pipeline::new(config.id, decoders, pushers)
                .run(receiver)
                .instrument(span.clone()),
        );

        let cancel = CancellationToken::new();
        let state = Arc::new(RwLock::new(ListenerState::Running));
        let listener_task = {
            let listener = listener.clone();
            let cancel = cancel.clone();
            let state = state.clone();
            let listener_id = config.id;
            tokio::spawn(
                async move {
                    let finished = match listener.run(cancel, queue).await {
                        Ok(()) => ListenerState::Stopped,
                        Err(err) => {
                            record_listener_failure();
                            error!(target: "gateway.control", listener_id, error = %err, "listener_failed");
                            ListenerState::Failed(err.to_string())
                        }
                    };
                    *state.write().unwrap_or_else(PoisonError::into_inner) = finished;
                }
                .instrument(span),
            )
        };

        info!(
            target: "gateway.control",
            listener_id = config.id,
            listener_name = %config.name,
            kind = config.kind.name(),
            "listener_applied"
        );
        let handle = ListenerHandle {
            config: config.clone(),
            listener,
            cancel,
            state,
            tasks: Mutex::new(Some((listener_task, pipeline_task))),
        };
        let replaced = self
            .registry
            .set(GROUP_LISTENER, &config.id.to_string(), Arc::new(handle));
        if let Some(stale) = replaced {
            warn!(target: "gateway.control", listener_id = config.id, "listener_replaced_unexpectedly");
            self.stop_entry(config.id, stale).await;
        }
        Ok(ListenerState::Running)
    }

    /// 停止并移除运行实例；不存在时返回 false。
    pub async fn stop_listener(&self, id: i64) -> bool {
        let _lifecycle = self.lifecycle.lock().await;
        self.stop_instance(id).await
    }

    async fn stop_instance(&self, id: i64) -> bool {
        let Some(entry) = self.registry.remove(GROUP_LISTENER, &id.to_string()) else {
            return false;
        };
        self.stop_entry(id, entry).await;
        true
    }

    async fn stop_entry(&self, id: i64, entry: gateway_registry::Entry) {
        if let Ok(handle) = entry.downcast::<ListenerHandle>() {
            handle.stop(self.settings.shutdown_grace).await;
            info!(target: "gateway.control", listener_id = id, "listener_stopped");
        }
    }

    pub async fn remove_listener(&self, id: i64) -> bool {
        let removed = self.stop_listener(id).await;
        if removed {
            info!(target: "gateway.control", listener_id = id, "listener_removed");
        }
        removed
    }

    /// 实例状态；没有实例时为 Stopped。
    pub fn status(&self, id: i64) -> ListenerState {
        self.registry
            .get_as::<ListenerHandle>(GROUP_LISTENER, &id.to_string())
            .map(|handle| handle.state())
            .unwrap_or(ListenerState::Stopped)
    }

    pub fn running_listeners(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self
            .registry
            .keys(GROUP_LISTENER)
            .iter()
            .filter_map(|key| key.parse().ok())
            .collect();
        ids.sort_unstable();
        ids
    }

    /// 编译并登记脚本。脚本需定义 `decode` 或 `poll` 之一。
    ///
    /// 已运行的脚本监听器继续使用旧程序，重新应用监听器后才切换。
    pub async fn apply_script(&self, script: DecodeScript) -> Result<(), ControlError> {
        let key = script.key();
        let program = self.scripts.compile(&key, &script.script).await?;
        let decodes = program.has_function(gateway_decode::DECODE_FN).await?;
        let polls = program.has_function(POLL_FN).await?;
        if !decodes && !polls {
            return Err(ScriptError::MissingFunction(gateway_decode::DECODE_FN.to_string()).into());
        }

        let decoder = decodes.then(|| Arc::new(ScriptDecoder::new(program.clone())));
        if decodes {
            self.catalog.register(DecoderInfo::new(key.clone(), script.name.clone()));
        } else {
            self.catalog.unregister(&key);
        }
        info!(
            target: "gateway.control",
            script_id = script.id,
            decodes,
            polls,
            "script_applied"
        );
        let entry = ScriptEntry {
            script,
            program,
            decoder,
        };
        self.registry.set(GROUP_DECODER, &key, Arc::new(entry));
        Ok(())
    }

    pub fn remove_script(&self, id: i64) -> bool {
        let key = DecodeScript::key_for(id);
        self.catalog.unregister(&key);
        let removed = self.registry.remove(GROUP_DECODER, &key).is_some();
        if removed {
            info!(target: "gateway.control", script_id = id, "script_removed");
        }
        removed
    }

    /// 构建并登记推送器；配置未启用时移除。
    pub async fn apply_push(&self, config: PushConfig) -> Result<(), ControlError> {
        let key = config.id.to_string();
        if !config.enabled {
            self.registry.remove(GROUP_PUSHER, &key);
            return Ok(());
        }
        let pusher = build_pusher(&config)?;
        info!(
            target: "gateway.control",
            push_id = config.id,
            kind = config.kind.name(),
            retry = config.retry,
            "push_applied"
        );
        self.registry
            .set(GROUP_PUSHER, &key, Arc::new(PusherEntry { config, pusher }));
        Ok(())
    }

    pub fn remove_push(&self, id: i64) -> bool {
        self.registry
            .remove(GROUP_PUSHER, &id.to_string())
            .is_some()
    }

    /// 停止全部监听实例。
    pub async fn shutdown(&self) {
        let _lifecycle = self.lifecycle.lock().await;
        let ids = self.running_listeners();
        info!(target: "gateway.control", listeners = ids.len(), "supervisor_shutdown");
        for id in ids {
            self.stop_instance(id).await;
        }
    }

    fn decoder_table(&self, config: &ListenerConfig) -> Result<DecoderTable, ControlError> {
        let mut table = DecoderTable::new();
        for node in &config.routes {
            table.insert(config.route_key(&node.path), self.resolve_decoder(&node.decoder)?);
        }
        Ok(table)
    }

    /// 固定协议按 key 分派；`script{id}` 经注册表间接引用。
    fn resolve_decoder(&self, key: &str) -> Result<Arc<dyn Decoder>, ControlError> {
        if let Some(builtin) = BuiltinDecoder::from_key(key) {
            return Ok(Arc::new(builtin));
        }
        let id = DecodeScript::parse_key(key)
            .ok_or_else(|| ControlError::UnknownDecoder(key.to_string()))?;
        let registered = self
            .registry
            .get_as::<ScriptEntry>(GROUP_DECODER, key)
            .ok_or(ControlError::UnknownScript(id))?;
        if registered.decoder.is_none() {
            return Err(ControlError::UnknownDecoder(key.to_string()));
        }
        Ok(Arc::new(RegistryDecoder::new(self.registry.clone(), key.to_string())))
    }

    fn poll_program(&self, script_id: i64) -> Result<Program, ControlError> {
        self.registry
            .get_as::<ScriptEntry>(GROUP_DECODER, &DecodeScript::key_for(script_id))
            .map(|entry| entry.program.clone())
            .ok_or(ControlError::UnknownScript(script_id))
    }
}
