//! TCP 监听：每个连接独立分包，帧按到达顺序入队。

use crate::split::{self, SplitCodec, Splitter};
use crate::{Lifecycle, ListenError, Listener};
use async_trait::async_trait;
use domain::{ListenerConfig, QueueItem, SplitConfig};
use futures_util::StreamExt;
use gateway_queue::{EnqueueOutcome, QueueSender};
use gateway_telemetry::record_payload_received;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

pub struct TcpListener {
    config: ListenerConfig,
    split: SplitConfig,
    grace: Duration,
    lifecycle: Lifecycle,
}

impl TcpListener {
    /// 分包配置在构建时校验。
    pub fn new(
        config: ListenerConfig,
        split: SplitConfig,
        grace: Duration,
    ) -> Result<Self, ListenError> {
        split::from_config(&split)?;
        Ok(Self {
            config,
            split,
            grace,
            lifecycle: Lifecycle::new(),
        })
    }

    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.lifecycle.bound_addr().await
    }
}

#[async_trait]
impl Listener for TcpListener {
    fn kind(&self) -> &'static str {
        "tcp"
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
            "tcp_listener_started"
        );

        let connections = TaskTracker::new();
        let result = loop {
            tokio::select! {
                biased;
                _ = stop.cancelled() => break Ok(()),
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let splitter = match split::from_config(&self.split) {
                            Ok(splitter) => splitter,
                            Err(err) => break Err(ListenError::Split(err)),
                        };
                        connections.spawn(serve_connection(
                            stream,
                            peer,
                            splitter,
                            self.config.id,
                            queue.clone(),
                            stop.clone(),
                        ));
                    }
                    Err(err) => break Err(ListenError::Accept(err)),
                },
            }
        };

        drop(listener);
        stop.cancel();
        connections.close();
        if tokio::time::timeout(self.grace, connections.wait()).await.is_err() {
            warn!(
                target: "gateway.listen",
                listener_id = self.config.id,
                open = connections.len(),
                "tcp_listener_drain_timeout"
            );
        }
        info!(target: "gateway.listen", listener_id = self.config.id, "tcp_listener_stopped");
        result
    }

    async fn close(&self) -> Result<(), ListenError> {
        self.lifecycle.close();
        Ok(())
    }
}

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    splitter: Box<dyn Splitter>,
    listener_id: i64,
    queue: QueueSender,
    stop: CancellationToken,
) {
    debug!(target: "gateway.listen", listener_id, peer = %peer, "tcp_connection_opened");
    let mut frames = FramedRead::new(stream, SplitCodec::new(splitter));
    loop {
        let next = tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            next = frames.next() => next,
        };
        let frame = match next {
            Some(Ok(frame)) => frame,
            Some(Err(err)) => {
                warn!(
                    target: "gateway.listen",
                    listener_id,
                    peer = %peer,
                    error = %err,
                    "tcp_frame_error"
                );
                break;
            }
            None => break,
        };

        record_payload_received();
        match queue.enqueue(QueueItem::new(listener_id, None, frame), &stop).await {
            EnqueueOutcome::Accepted => {}
            EnqueueOutcome::Overloaded => {
                warn!(target: "gateway.listen", listener_id, peer = %peer, "tcp_payload_overloaded");
            }
            EnqueueOutcome::Cancelled | EnqueueOutcome::Closed => break,
        }
    }
    debug!(target: "gateway.listen", listener_id, peer = %peer, "tcp_connection_closed");
}
