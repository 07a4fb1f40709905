//! 监听配置 handlers
//!
//! - GET /listen - 列出监听配置
//! - POST /listen - 创建（启用时立即拉起实例）
//! - PUT /listen/{id} - 整条替换并重新应用
//! - PUT /listen/{id}/enable、/disable - 启停
//! - DELETE /listen/{id} - 停止实例并删除
//! - GET /listen/{id}/status - 运行状态
//!
//! 存储与运行实例的一致性：应用失败时存储回滚到请求前的状态。

use super::IdPath;
use crate::AppState;
use crate::utils::{
    control_error, listener_status_to_dto, normalize_required, not_found_error, ok, storage_error,
};
use axum::{
    Json,
    extract::{Path, State},
    response::Response,
};
use domain::ListenerConfig;
use tracing::warn;

pub async fn list_listeners(State(state): State<AppState>) -> Response {
    match state.listener_store.list_listeners().await {
        Ok(records) => ok(records),
        Err(err) => storage_error(err),
    }
}

pub async fn create_listener(
    State(state): State<AppState>,
    Json(mut record): Json<ListenerConfig>,
) -> Response {
    record.name = match normalize_required(record.name, "name") {
        Ok(value) => value,
        Err(response) => return response,
    };
    let record = match state.listener_store.create_listener(record).await {
        Ok(record) => record,
        Err(err) => return storage_error(err),
    };
    if let Err(err) = state.supervisor.apply_listener(record.clone()).await {
        if let Err(rollback) = state.listener_store.delete_listener(record.id).await {
            warn!(target: "gateway.server", listener_id = record.id, error = %rollback, "listener_rollback_failed");
        }
        return control_error(err);
    }
    ok(record)
}

pub async fn update_listener(
    State(state): State<AppState>,
    Path(path): Path<IdPath>,
    Json(mut record): Json<ListenerConfig>,
) -> Response {
    record.id = path.id;
    record.name = match normalize_required(record.name, "name") {
        Ok(value) => value,
        Err(response) => return response,
    };
    match state.listener_store.find_listener(path.id).await {
        Ok(Some(_)) => {}
        Ok(None) => return not_found_error(),
        Err(err) => return storage_error(err),
    }
    // 校验失败时旧实例保持运行，存储不变
    if let Err(err) = state.supervisor.apply_listener(record.clone()).await {
        return control_error(err);
    }
    match state.listener_store.update_listener(path.id, record).await {
        Ok(Some(record)) => ok(record),
        Ok(None) => {
            state.supervisor.remove_listener(path.id).await;
            not_found_error()
        }
        Err(err) => storage_error(err),
    }
}

pub async fn enable_listener(State(state): State<AppState>, Path(path): Path<IdPath>) -> Response {
    toggle(&state, path.id, true).await
}

pub async fn disable_listener(State(state): State<AppState>, Path(path): Path<IdPath>) -> Response {
    toggle(&state, path.id, false).await
}

async fn toggle(state: &AppState, id: i64, enabled: bool) -> Response {
    let record = match state.listener_store.set_listener_enabled(id, enabled).await {
        Ok(Some(record)) => record,
        Ok(None) => return not_found_error(),
        Err(err) => return storage_error(err),
    };
    match state.supervisor.apply_listener(record).await {
        Ok(listener_state) => ok(listener_status_to_dto(id, listener_state)),
        Err(err) => {
            if let Err(rollback) = state.listener_store.set_listener_enabled(id, !enabled).await {
                warn!(target: "gateway.server", listener_id = id, error = %rollback, "listener_rollback_failed");
            }
            control_error(err)
        }
    }
}

pub async fn delete_listener(State(state): State<AppState>, Path(path): Path<IdPath>) -> Response {
    state.supervisor.remove_listener(path.id).await;
    match state.listener_store.delete_listener(path.id).await {
        Ok(true) => ok(()),
        Ok(false) => not_found_error(),
        Err(err) => storage_error(err),
    }
}

pub async fn listener_status(State(state): State<AppState>, Path(path): Path<IdPath>) -> Response {
    match state.listener_store.find_listener(path.id).await {
        Ok(Some(_)) => ok(listener_status_to_dto(
            path.id,
            state.supervisor.status(path.id),
        )),
        Ok(None) => not_found_error(),
        Err(err) => storage_error(err),
    }
}
