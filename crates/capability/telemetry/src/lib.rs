//! 追踪、请求 ID 生成与流水线计数指标。

use serde::Serialize;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, fmt};

/// 请求级追踪标识。
#[derive(Debug, Clone)]
pub struct RequestIds {
    pub request_id: String,
    pub trace_id: String,
}

/// 指标快照。
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct MetricsSnapshot {
    pub payloads_received: u64,
    pub payloads_enqueued: u64,
    pub enqueue_overload: u64,
    pub enqueue_cancelled: u64,
    pub decode_success: u64,
    pub decode_failure: u64,
    pub push_success: u64,
    pub push_failure: u64,
    pub push_dropped: u64,
    pub listener_failures: u64,
}

/// 网关计数指标。
pub struct TelemetryMetrics {
    payloads_received: AtomicU64,
    payloads_enqueued: AtomicU64,
    enqueue_overload: AtomicU64,
    enqueue_cancelled: AtomicU64,
    decode_success: AtomicU64,
    decode_failure: AtomicU64,
    push_success: AtomicU64,
    push_failure: AtomicU64,
    push_dropped: AtomicU64,
    listener_failures: AtomicU64,
}

impl TelemetryMetrics {
    pub fn new() -> Self {
        Self {
            payloads_received: AtomicU64::new(0),
            payloads_enqueued: AtomicU64::new(0),
            enqueue_overload: AtomicU64::new(0),
            enqueue_cancelled: AtomicU64::new(0),
            decode_success: AtomicU64::new(0),
            decode_failure: AtomicU64::new(0),
            push_success: AtomicU64::new(0),
            push_failure: AtomicU64::new(0),
            push_dropped: AtomicU64::new(0),
            listener_failures: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            payloads_received: self.payloads_received.load(Ordering::Relaxed),
            payloads_enqueued: self.payloads_enqueued.load(Ordering::Relaxed),
            enqueue_overload: self.enqueue_overload.load(Ordering::Relaxed),
            enqueue_cancelled: self.enqueue_cancelled.load(Ordering::Relaxed),
            decode_success: self.decode_success.load(Ordering::Relaxed),
            decode_failure: self.decode_failure.load(Ordering::Relaxed),
            push_success: self.push_success.load(Ordering::Relaxed),
            push_failure: self.push_failure.load(Ordering::Relaxed),
            push_dropped: self.push_dropped.load(Ordering::Relaxed),
            listener_failures: self.listener_failures.load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

static METRICS: OnceLock<TelemetryMetrics> = OnceLock::new();

/// 获取全局指标实例。
pub fn metrics() -> &'static TelemetryMetrics {
    METRICS.get_or_init(TelemetryMetrics::new)
}

/// 初始化 tracing（默认 info）。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// 生成新的 request_id 与 trace_id。
pub fn new_request_ids() -> RequestIds {
    RequestIds {
        request_id: uuid::Uuid::new_v4().to_string(),
        trace_id: uuid::Uuid::new_v4().to_string(),
    }
}

/// 记录监听器收到的载荷数。
pub fn record_payload_received() {
    metrics().payloads_received.fetch_add(1, Ordering::Relaxed);
}

/// 记录成功入队次数。
pub fn record_payload_enqueued() {
    metrics().payloads_enqueued.fetch_add(1, Ordering::Relaxed);
}

/// 记录入队超时（过载）次数。
pub fn record_enqueue_overload() {
    metrics().enqueue_overload.fetch_add(1, Ordering::Relaxed);
}

/// 记录调用方放弃入队次数。
pub fn record_enqueue_cancelled() {
    metrics().enqueue_cancelled.fetch_add(1, Ordering::Relaxed);
}

pub fn record_decode_success() {
    metrics().decode_success.fetch_add(1, Ordering::Relaxed);
}

pub fn record_decode_failure() {
    metrics().decode_failure.fetch_add(1, Ordering::Relaxed);
}

pub fn record_push_success() {
    metrics().push_success.fetch_add(1, Ordering::Relaxed);
}

/// 记录单次推送尝试失败。
pub fn record_push_failure() {
    metrics().push_failure.fetch_add(1, Ordering::Relaxed);
}

/// 记录重试耗尽后被丢弃的消息。
pub fn record_push_dropped() {
    metrics().push_dropped.fetch_add(1, Ordering::Relaxed);
}

/// 记录监听器异常退出次数。
pub fn record_listener_failure() {
    metrics().listener_failures.fetch_add(1, Ordering::Relaxed);
}
