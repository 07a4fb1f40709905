//! 处理循环：从监听器队列取出载荷，解析后依次交给该监听器的推送器。
//!
//! 解析失败只丢弃当前载荷；推送失败由推送器自身的重试策略处理，
//! 循环本身从不因单条载荷退出，队列关闭且取空后才结束。

use domain::{OutboundMessage, QueueItem};
use gateway_decode::{Decoder, Nothing};
use gateway_push::Pusher;
use gateway_queue::QueueReceiver;
use gateway_telemetry::{record_decode_failure, record_decode_success};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// 路由 → 解析器映射。
///
/// 未命中的路由（或无路由的载荷）回落到第一个路由的解析器；没有任何路由时透传。
#[derive(Clone, Default)]
pub struct DecoderTable {
    routes: HashMap<String, Arc<dyn Decoder>>,
    first: Option<Arc<dyn Decoder>>,
}

impl DecoderTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按插入顺序添加；同一路由重复添加时保留第一次。
    pub fn insert(&mut self, route: impl Into<String>, decoder: Arc<dyn Decoder>) {
        if self.first.is_none() {
            self.first = Some(decoder.clone());
        }
        self.routes.entry(route.into()).or_insert(decoder);
    }

    pub fn with(mut self, route: impl Into<String>, decoder: Arc<dyn Decoder>) -> Self {
        self.insert(route, decoder);
        self
    }

    pub fn select(&self, route: Option<&str>) -> Arc<dyn Decoder> {
        route
            .and_then(|route| self.routes.get(route))
            .or(self.first.as_ref())
            .cloned()
            .unwrap_or_else(|| Arc::new(Nothing))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// 单条载荷的处理结果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessResult {
    pub decoded: bool,
    /// 返回成功的推送器数量
    pub delivered: usize,
    pub reason: Option<String>,
}

struct PipelineInner {
    listener_id: i64,
    decoders: DecoderTable,
    pushers: Vec<Arc<dyn Pusher>>,
}

/// 单个监听器的处理流水线。
#[derive(Clone)]
pub struct Pipeline {
    inner: Arc<PipelineInner>,
}

impl Pipeline {
    pub fn new(listener_id: i64, decoders: DecoderTable, pushers: Vec<Arc<dyn Pusher>>) -> Self {
        Self {
            inner: Arc::new(PipelineInner {
                listener_id,
                decoders,
                pushers,
            }),
        }
    }

    pub fn listener_id(&self) -> i64 {
        self.inner.listener_id
    }

    /// 解析一条载荷并顺序推送给每个推送器。
    pub async fn handle(&self, item: QueueItem) -> ProcessResult {
        let decoder = self.inner.decoders.select(item.route.as_deref());
        let data = match decoder.decode(&item.payload).await {
            Ok(data) => {
                record_decode_success();
                data
            }
            Err(err) => {
                record_decode_failure();
                warn!(
                    target: "gateway.pipeline",
                    listener_id = self.inner.listener_id,
                    route = item.route.as_deref().unwrap_or(""),
                    payload_len = item.payload.len(),
                    error = %err,
                    "decode_failed"
                );
                return ProcessResult {
                    decoded: false,
                    delivered: 0,
                    reason: Some(err.to_string()),
                };
            }
        };

        let message = OutboundMessage::from_item(&item, data);
        let mut delivered = 0;
        for pusher in &self.inner.pushers {
            match pusher.push(&message).await {
                Ok(()) => delivered += 1,
                Err(err) => {
                    warn!(
                        target: "gateway.pipeline",
                        listener_id = self.inner.listener_id,
                        error = %err,
                        "push_failed"
                    );
                }
            }
        }
        ProcessResult {
            decoded: true,
            delivered,
            reason: None,
        }
    }

    /// 消费队列直到所有发送端释放且队列取空。
    pub async fn run(self, mut receiver: QueueReceiver) {
        info!(
            target: "gateway.pipeline",
            listener_id = self.inner.listener_id,
            routes = self.inner.decoders.len(),
            pushers = self.inner.pushers.len(),
            "pipeline_started"
        );
        while let Some(item) = receiver.recv().await {
            let result = self.handle(item).await;
            debug!(
                target: "gateway.pipeline",
                listener_id = self.inner.listener_id,
                decoded = result.decoded,
                delivered = result.delivered,
                "payload_processed"
            );
        }
        info!(target: "gateway.pipeline", listener_id = self.inner.listener_id, "pipeline_stopped");
    }

    pub fn spawn(self, receiver: QueueReceiver) -> JoinHandle<()> {
        tokio::spawn(self.run(receiver))
    }
}
