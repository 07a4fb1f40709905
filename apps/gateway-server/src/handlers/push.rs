//! 推送配置 handlers
//!
//! - GET /push、POST /push
//! - PUT /push/{id}、DELETE /push/{id}
//!
//! 推送器在注册表中按 ID 登记，监听流水线推送时才查找，
//! 因此更新立即生效，无需重启监听器。

use super::IdPath;
use crate::AppState;
use crate::utils::{control_error, normalize_required, not_found_error, ok, storage_error};
use axum::{
    Json,
    extract::{Path, State},
    response::Response,
};
use domain::PushConfig;
use tracing::warn;

pub async fn list_pushes(State(state): State<AppState>) -> Response {
    match state.push_store.list_pushes().await {
        Ok(records) => ok(records),
        Err(err) => storage_error(err),
    }
}

pub async fn create_push(
    State(state): State<AppState>,
    Json(mut record): Json<PushConfig>,
) -> Response {
    record.name = match normalize_required(record.name, "name") {
        Ok(value) => value,
        Err(response) => return response,
    };
    let record = match state.push_store.create_push(record).await {
        Ok(record) => record,
        Err(err) => return storage_error(err),
    };
    if let Err(err) = state.supervisor.apply_push(record.clone()).await {
        if let Err(rollback) = state.push_store.delete_push(record.id).await {
            warn!(target: "gateway.server", push_id = record.id, error = %rollback, "push_rollback_failed");
        }
        return control_error(err);
    }
    ok(record)
}

pub async fn update_push(
    State(state): State<AppState>,
    Path(path): Path<IdPath>,
    Json(mut record): Json<PushConfig>,
) -> Response {
    record.id = path.id;
    record.name = match normalize_required(record.name, "name") {
        Ok(value) => value,
        Err(response) => return response,
    };
    match state.push_store.find_push(path.id).await {
        Ok(Some(_)) => {}
        Ok(None) => return not_found_error(),
        Err(err) => return storage_error(err),
    }
    if let Err(err) = state.supervisor.apply_push(record.clone()).await {
        return control_error(err);
    }
    match state.push_store.update_push(path.id, record).await {
        Ok(Some(record)) => ok(record),
        Ok(None) => not_found_error(),
        Err(err) => storage_error(err),
    }
}

pub async fn delete_push(State(state): State<AppState>, Path(path): Path<IdPath>) -> Response {
    state.supervisor.remove_push(path.id);
    match state.push_store.delete_push(path.id).await {
        Ok(true) => ok(()),
        Ok(false) => not_found_error(),
        Err(err) => storage_error(err),
    }
}
