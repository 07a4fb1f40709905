//! 解析器目录与解析脚本 handlers
//!
//! - GET /decode/list - 可用解析器（固定协议 + 已登记脚本）
//! - GET /decode/script - 列出脚本
//! - POST /decode/script - 创建脚本（编译失败则拒绝）
//! - PUT /decode/script/{id} - 更新脚本
//! - DELETE /decode/script/{id} - 删除脚本

use super::IdPath;
use crate::AppState;
use crate::utils::{control_error, normalize_required, not_found_error, ok, storage_error};
use api_contract::{DecoderDto, ScriptRequest};
use axum::{
    Json,
    extract::{Path, State},
    response::Response,
};
use domain::DecodeScript;
use tracing::warn;

pub async fn list_decoders(State(state): State<AppState>) -> Response {
    let data: Vec<DecoderDto> = state
        .supervisor
        .decoders()
        .into_iter()
        .map(|info| DecoderDto {
            key: info.key,
            name: info.name,
        })
        .collect();
    ok(data)
}

pub async fn list_scripts(State(state): State<AppState>) -> Response {
    match state.script_store.list_scripts().await {
        Ok(records) => ok(records),
        Err(err) => storage_error(err),
    }
}

pub async fn create_script(
    State(state): State<AppState>,
    Json(req): Json<ScriptRequest>,
) -> Response {
    let name = match normalize_required(req.name, "name") {
        Ok(value) => value,
        Err(response) => return response,
    };
    let record = DecodeScript {
        id: 0,
        name,
        script: req.script,
    };
    let record = match state.script_store.create_script(record).await {
        Ok(record) => record,
        Err(err) => return storage_error(err),
    };
    if let Err(err) = state.supervisor.apply_script(record.clone()).await {
        if let Err(rollback) = state.script_store.delete_script(record.id).await {
            warn!(target: "gateway.server", script_id = record.id, error = %rollback, "script_rollback_failed");
        }
        return control_error(err);
    }
    ok(record)
}

pub async fn update_script(
    State(state): State<AppState>,
    Path(path): Path<IdPath>,
    Json(req): Json<ScriptRequest>,
) -> Response {
    let name = match normalize_required(req.name, "name") {
        Ok(value) => value,
        Err(response) => return response,
    };
    match state.script_store.find_script(path.id).await {
        Ok(Some(_)) => {}
        Ok(None) => return not_found_error(),
        Err(err) => return storage_error(err),
    }
    let record = DecodeScript {
        id: path.id,
        name,
        script: req.script,
    };
    // 编译失败时注册表中的旧程序不受影响
    if let Err(err) = state.supervisor.apply_script(record.clone()).await {
        return control_error(err);
    }
    match state.script_store.update_script(path.id, record).await {
        Ok(Some(record)) => ok(record),
        Ok(None) => not_found_error(),
        Err(err) => storage_error(err),
    }
}

pub async fn delete_script(State(state): State<AppState>, Path(path): Path<IdPath>) -> Response {
    state.supervisor.remove_script(path.id);
    match state.script_store.delete_script(path.id).await {
        Ok(true) => ok(()),
        Ok(false) => not_found_error(),
        Err(err) => storage_error(err),
    }
}
