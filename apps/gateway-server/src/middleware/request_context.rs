//! 请求上下文中间件：为每个管理请求生成 request_id / trace_id，
//! 注入请求扩展与日志 span，并写回响应头。

use axum::{body::Body, extract::Request, http::HeaderValue, middleware::Next, response::Response};
use gateway_telemetry::new_request_ids;
use std::time::Instant;
use tracing::{Instrument, debug, info_span};

pub async fn request_context(mut req: Request<Body>, next: Next) -> Response {
    let ids = new_request_ids();
    let span = info_span!(
        "request",
        request_id = %ids.request_id,
        trace_id = %ids.trace_id,
        method = %req.method(),
        path = %req.uri().path()
    );
    req.extensions_mut().insert(ids.clone());

    let started = Instant::now();
    let mut response = next.run(req).instrument(span.clone()).await;
    span.in_scope(|| {
        debug!(
            target: "gateway.server",
            status = response.status().as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "request_completed"
        );
    });

    for (name, id) in [("x-request-id", &ids.request_id), ("x-trace-id", &ids.trace_id)] {
        if let Ok(value) = HeaderValue::from_str(id) {
            response.headers_mut().insert(name, value);
        }
    }
    response
}
