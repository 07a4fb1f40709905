//! # 监听能力模块
//!
//! 监听器接收外部载荷并放入流水线队列：
//! - **HTTP**：每个请求体为一条载荷（200 / 503 / 客户端断开不响应）
//! - **TCP**：按分包规则把连接字节流切成多条载荷
//! - **MQTT**：订阅路由主题，每条发布消息为一条载荷
//! - **脚本**：周期调用脚本中的 `poll()` 产生载荷
//!
//! 绑定/接受连接失败会从 `run` 返回；单条请求的错误只记录日志并丢弃。
//! 外部取消或调用 `close` 后，`run` 在宽限期内退出。

mod error;
mod http;
mod mqtt;
mod script;
pub mod split;
mod tcp;

pub use error::ListenError;
pub use http::{DEFAULT_MAX_BODY_BYTES, HttpListener};
pub use mqtt::{MqttListener, topic_matches};
pub use script::{POLL_FN, ScriptListener, payloads_from};
pub use tcp::TcpListener;

use async_trait::async_trait;
use domain::{ListenerConfig, ListenerKind};
use gateway_queue::QueueSender;
use gateway_script::Program;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// 默认停止宽限期。
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// 监听器契约。
#[async_trait]
pub trait Listener: Send + Sync {
    fn kind(&self) -> &'static str;

    /// 阻塞运行，直到 `cancel` 触发、`close` 被调用或发生不可恢复的接入错误。
    async fn run(&self, cancel: CancellationToken, queue: QueueSender) -> Result<(), ListenError>;

    /// 请求停止；实例关闭后不可复用。
    async fn close(&self) -> Result<(), ListenError>;
}

/// 按配置构建监听器；脚本监听器需要已编译的程序。
pub fn build_listener(
    config: &ListenerConfig,
    grace: Duration,
    program: Option<Program>,
) -> Result<Arc<dyn Listener>, ListenError> {
    let listener: Arc<dyn Listener> = match &config.kind {
        ListenerKind::Http => Arc::new(HttpListener::new(config.clone(), grace)?),
        ListenerKind::Tcp { split } => {
            Arc::new(TcpListener::new(config.clone(), split.clone(), grace)?)
        }
        ListenerKind::Mqtt(broker) => Arc::new(MqttListener::new(config.clone(), broker.clone())),
        ListenerKind::Script { interval_ms, .. } => {
            let program = program.ok_or_else(|| {
                ListenError::Config(format!("script listener {} has no program", config.id))
            })?;
            Arc::new(ScriptListener::new(
                config.clone(),
                program,
                Duration::from_millis(*interval_ms),
            ))
        }
    };
    Ok(listener)
}

/// 监听器共用的停止与绑定状态。
#[derive(Debug)]
pub(crate) struct Lifecycle {
    shutdown: CancellationToken,
    bound: watch::Sender<Option<SocketAddr>>,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        let (bound, _) = watch::channel(None);
        Self {
            shutdown: CancellationToken::new(),
            bound,
        }
    }

    /// 合并外部取消与 `close`：任一触发即取消返回的令牌。
    ///
    /// 调用方在 `run` 结束时应取消返回的令牌（可用 `drop_guard`）以结束内部转发任务。
    pub(crate) fn link(&self, cancel: &CancellationToken) -> CancellationToken {
        let stop = self.shutdown.child_token();
        let outer = cancel.clone();
        let forward = stop.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = outer.cancelled() => forward.cancel(),
                _ = forward.cancelled() => {}
            }
        });
        stop
    }

    pub(crate) fn close(&self) {
        self.shutdown.cancel();
    }

    pub(crate) fn set_bound(&self, addr: SocketAddr) {
        self.bound.send_replace(Some(addr));
    }

    /// 等待绑定完成并返回实际地址；实例已关闭时返回 None。
    pub(crate) async fn bound_addr(&self) -> Option<SocketAddr> {
        let mut rx = self.bound.subscribe();
        tokio::select! {
            addr = rx.wait_for(|addr| addr.is_some()) => addr.ok().and_then(|addr| *addr),
            _ = self.shutdown.cancelled() => *self.bound.borrow(),
        }
    }
}
