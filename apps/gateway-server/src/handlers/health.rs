//! 健康检查与指标快照
//!
//! - GET /health
//! - GET /metrics

use crate::AppState;
use crate::utils::ok;
use api_contract::{HealthDto, MetricsSnapshotDto};
use axum::{extract::State, response::Response};
use gateway_telemetry::metrics;

pub async fn health(State(state): State<AppState>) -> Response {
    ok(HealthDto {
        ok: true,
        running_listeners: state.supervisor.running_listeners().len(),
    })
}

pub async fn get_metrics() -> Response {
    let snapshot = metrics().snapshot();
    ok(MetricsSnapshotDto {
        payloads_received: snapshot.payloads_received,
        payloads_enqueued: snapshot.payloads_enqueued,
        enqueue_overload: snapshot.enqueue_overload,
        enqueue_cancelled: snapshot.enqueue_cancelled,
        decode_success: snapshot.decode_success,
        decode_failure: snapshot.decode_failure,
        push_success: snapshot.push_success,
        push_failure: snapshot.push_failure,
        push_dropped: snapshot.push_dropped,
        listener_failures: snapshot.listener_failures,
    })
}
