//! 网关进程：加载配置、恢复运行实例并提供管理 API。
//!
//! 启动顺序：脚本 → 推送 → 监听器（监听器引用前两者）。
//! Ctrl-C 后先停止管理 API，再停止全部监听实例。

mod handlers;
mod middleware;
mod routes;
mod utils;

use gateway_config::GatewayConfig;
use gateway_control::{Supervisor, SupervisorSettings};
use gateway_script::{ScriptHost, ScriptSettings};
use gateway_storage::{
    Bootstrap, DecodeScriptStore, InMemoryDecodeScriptStore, InMemoryListenerStore,
    InMemoryPushStore, ListenerStore, PushStore, StorageError,
};
use gateway_telemetry::init_tracing;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Clone)]
pub struct AppState {
    pub supervisor: Arc<Supervisor>,
    pub listener_store: Arc<dyn ListenerStore>,
    pub script_store: Arc<dyn DecodeScriptStore>,
    pub push_store: Arc<dyn PushStore>,
}

impl AppState {
    /// 内存存储版本。
    pub fn in_memory(supervisor: Arc<Supervisor>) -> Self {
        Self {
            supervisor,
            listener_store: Arc::new(InMemoryListenerStore::new()),
            script_store: Arc::new(InMemoryDecodeScriptStore::new()),
            push_store: Arc::new(InMemoryPushStore::new()),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载本地 .env（如存在）
    dotenvy::dotenv().ok();
    let config = GatewayConfig::from_env()?;
    init_tracing();

    let scripts = ScriptHost::new(ScriptSettings {
        timeout: config.script_timeout(),
        heap_limit_mb: config.script_heap_mb,
    })?;
    let supervisor = Arc::new(Supervisor::new(SupervisorSettings::from(&config), scripts));
    let state = AppState::in_memory(supervisor.clone());

    if let Some(path) = &config.bootstrap_file {
        Bootstrap::from_file(path)?
            .load_into(
                state.listener_store.as_ref(),
                state.script_store.as_ref(),
                state.push_store.as_ref(),
            )
            .await?;
    }
    restore(&state, config.autostart).await?;

    let app = routes::build_app(state);
    let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
    info!(target: "gateway.server", address = %config.http_addr, "admin_api_started");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    supervisor.shutdown().await;
    info!(target: "gateway.server", "gateway_stopped");
    Ok(())
}

/// 按存储中的记录拉起运行实例；单条失败只记录日志。
async fn restore(state: &AppState, autostart: bool) -> Result<(), StorageError> {
    for script in state.script_store.list_scripts().await? {
        if let Err(err) = state.supervisor.apply_script(script.clone()).await {
            warn!(target: "gateway.server", script_id = script.id, error = %err, "restore_script_failed");
        }
    }
    for push in state.push_store.list_pushes().await? {
        if let Err(err) = state.supervisor.apply_push(push.clone()).await {
            warn!(target: "gateway.server", push_id = push.id, error = %err, "restore_push_failed");
        }
    }
    if !autostart {
        info!(target: "gateway.server", "autostart_disabled");
        return Ok(());
    }
    for listener in state.listener_store.list_listeners().await? {
        if !listener.enabled {
            continue;
        }
        if let Err(err) = state.supervisor.apply_listener(listener.clone()).await {
            warn!(
                target: "gateway.server",
                listener_id = listener.id,
                error = %err,
                "restore_listener_failed"
            );
        }
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(target: "gateway.server", error = %err, "shutdown_signal_failed");
        // 无法监听信号时保持运行
        std::future::pending::<()>().await;
    }
    info!(target: "gateway.server", "shutdown_requested");
}
