//! HTTP 监听：每个 POST 请求体为一条载荷。
//!
//! 入队成功返回 200；过载或监听器正在停止返回 503；
//! 请求体超过上限返回 413。
//! 客户端提前断开时请求处理被丢弃，不产生响应。

use crate::{Lifecycle, ListenError, Listener};
use async_trait::async_trait;
use axum::Router;
use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::{DefaultBodyLimit, MatchedPath, State};
use axum::http::{Method, StatusCode};
use axum::routing::post;
use domain::{ListenerConfig, QueueItem};
use gateway_queue::{EnqueueOutcome, QueueSender};
use gateway_telemetry::record_payload_received;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// 单个请求体上限（1 MiB）。
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

pub struct HttpListener {
    config: ListenerConfig,
    paths: Vec<String>,
    grace: Duration,
    max_body: usize,
    lifecycle: Lifecycle,
}

struct IngressState {
    listener_id: i64,
    queue: QueueSender,
    stop: CancellationToken,
}

impl HttpListener {
    /// 路由路径统一补全前导 `/` 并去重；不支持路径参数。
    pub fn new(config: ListenerConfig, grace: Duration) -> Result<Self, ListenError> {
        let mut paths: Vec<String> = Vec::new();
        for node in &config.routes {
            let path = config.route_key(&node.path);
            if path.contains([':', '*', '{', '}']) {
                return Err(ListenError::Config(format!(
                    "http route {path} must be a literal path"
                )));
            }
            if !paths.contains(&path) {
                paths.push(path);
            }
        }
        Ok(Self {
            config,
            paths,
            grace,
            max_body: DEFAULT_MAX_BODY_BYTES,
            lifecycle: Lifecycle::new(),
        })
    }

    pub fn with_max_body(mut self, bytes: usize) -> Self {
        self.max_body = bytes;
        self
    }

    /// 构建请求路由；`stop` 触发后新请求一律返回 503。
    pub fn router(&self, queue: QueueSender, stop: CancellationToken) -> Router {
        let state = Arc::new(IngressState {
            listener_id: self.config.id,
            queue,
            stop,
        });
        let router = if self.paths.is_empty() {
            Router::new().fallback(ingest_any)
        } else {
            self.paths
                .iter()
                .fold(Router::new(), |router, path| router.route(path, post(ingest)))
        };
        router
            .layer(DefaultBodyLimit::max(self.max_body))
            .with_state(state)
    }

    /// 等待绑定完成后的实际地址（端口为 0 时由系统分配）。
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.lifecycle.bound_addr().await
    }
}

#[async_trait]
impl Listener for HttpListener {
    fn kind(&self) -> &'static str {
        "http"
    }

    async fn run(&self, cancel: CancellationToken, queue: QueueSender) -> Result<(), ListenError> {
        let stop = self.lifecycle.link(&cancel);
        let _stop_guard = stop.clone().drop_guard();

        let address = self.config.bind_addr();
        let listener = tokio::net::TcpListener::bind(&address)
            .await
            .map_err(|source| ListenError::Bind {
                address: address.clone(),
                source,
            })?;
        if let Ok(local) = listener.local_addr() {
            self.lifecycle.set_bound(local);
        }
        info!(
            target: "gateway.listen",
            listener_id = self.config.id,
            address = %address,
            routes = self.paths.len(),
            "http_listener_started"
        );

        let app = self.router(queue, stop.clone());
        let shutdown = stop.clone();
        let mut server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await
        });

        let joined = tokio::select! {
            joined = &mut server => joined,
            _ = stop.cancelled() => match tokio::time::timeout(self.grace, &mut server).await {
                Ok(joined) => joined,
                Err(_) => {
                    warn!(
                        target: "gateway.listen",
                        listener_id = self.config.id,
                        grace_ms = self.grace.as_millis() as u64,
                        "http_listener_shutdown_timeout"
                    );
                    server.abort();
                    Ok(Ok(()))
                }
            },
        };

        info!(target: "gateway.listen", listener_id = self.config.id, "http_listener_stopped");
        match joined {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(ListenError::Server(err.to_string())),
            Err(err) => Err(ListenError::Server(err.to_string())),
        }
    }

    async fn close(&self) -> Result<(), ListenError> {
        self.lifecycle.close();
        Ok(())
    }
}

async fn ingest(
    State(state): State<Arc<IngressState>>,
    matched: Option<MatchedPath>,
    body: Result<Bytes, BytesRejection>,
) -> StatusCode {
    let route = matched.map(|path| path.as_str().to_string());
    accept(&state, route, body).await
}

async fn ingest_any(
    State(state): State<Arc<IngressState>>,
    method: Method,
    body: Result<Bytes, BytesRejection>,
) -> StatusCode {
    if method != Method::POST {
        return StatusCode::METHOD_NOT_ALLOWED;
    }
    accept(&state, None, body).await
}

async fn accept(
    state: &IngressState,
    route: Option<String>,
    body: Result<Bytes, BytesRejection>,
) -> StatusCode {
    let payload = match body {
        Ok(payload) => payload,
        Err(rejection) => {
            warn!(
                target: "gateway.listen",
                listener_id = state.listener_id,
                status = rejection.status().as_u16(),
                error = %rejection.body_text(),
                "http_body_rejected"
            );
            return rejection.status();
        }
    };
    record_payload_received();

    let item = QueueItem::new(state.listener_id, route, payload);
    match state.queue.enqueue(item, &state.stop).await {
        EnqueueOutcome::Accepted => StatusCode::OK,
        EnqueueOutcome::Overloaded => {
            warn!(
                target: "gateway.listen",
                listener_id = state.listener_id,
                "http_payload_overloaded"
            );
            StatusCode::SERVICE_UNAVAILABLE
        }
        EnqueueOutcome::Cancelled | EnqueueOutcome::Closed => StatusCode::SERVICE_UNAVAILABLE,
    }
}
