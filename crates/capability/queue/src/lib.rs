//! 监听器与处理循环之间的有界交接队列。
//!
//! 入队同时竞争三件事：调用方取消、队列空位、固定超时。
//! 取消优先于空位，空位优先于超时；超时即视为过载，载荷被丢弃。

use domain::QueueItem;
use gateway_telemetry::{
    record_enqueue_cancelled, record_enqueue_overload, record_payload_enqueued,
};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// 默认入队超时。
pub const DEFAULT_ENQUEUE_TIMEOUT: Duration = Duration::from_secs(5);

/// 入队结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// 已放入队列
    Accepted,
    /// 调用方在放入前取消，静默放弃
    Cancelled,
    /// 超时未能放入，载荷丢弃
    Overloaded,
    /// 处理循环已退出
    Closed,
}

impl EnqueueOutcome {
    pub fn is_accepted(self) -> bool {
        matches!(self, EnqueueOutcome::Accepted)
    }
}

/// 创建一条有界队列。容量为 0 时按 1 处理。
pub fn channel(capacity: usize, timeout: Duration) -> (QueueSender, QueueReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (QueueSender { tx, timeout }, QueueReceiver { rx })
}

/// 队列发送端（监听器持有，可克隆）。
#[derive(Debug, Clone)]
pub struct QueueSender {
    tx: mpsc::Sender<QueueItem>,
    timeout: Duration,
}

impl QueueSender {
    pub async fn enqueue(&self, item: QueueItem, cancel: &CancellationToken) -> EnqueueOutcome {
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => EnqueueOutcome::Cancelled,
            permit = self.tx.reserve() => match permit {
                Ok(permit) => {
                    permit.send(item);
                    EnqueueOutcome::Accepted
                }
                Err(_) => EnqueueOutcome::Closed,
            },
            _ = tokio::time::sleep(self.timeout) => EnqueueOutcome::Overloaded,
        };

        match outcome {
            EnqueueOutcome::Accepted => record_payload_enqueued(),
            EnqueueOutcome::Cancelled => record_enqueue_cancelled(),
            EnqueueOutcome::Overloaded => record_enqueue_overload(),
            EnqueueOutcome::Closed => {
                debug!(target: "gateway.queue", "enqueue_on_closed_queue");
            }
        }
        outcome
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// 队列接收端（处理循环持有）。
#[derive(Debug)]
pub struct QueueReceiver {
    rx: mpsc::Receiver<QueueItem>,
}

impl QueueReceiver {
    /// 按到达顺序取出下一条；所有发送端释放且队列为空时返回 None。
    pub async fn recv(&mut self) -> Option<QueueItem> {
        self.rx.recv().await
    }

    /// 停止接收新条目，已入队的仍可取出。
    pub fn close(&mut self) {
        self.rx.close();
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(n: u8) -> QueueItem {
        QueueItem::new(1, None, vec![n])
    }

    #[tokio::test]
    async fn fifo_per_source() {
        let (tx, mut rx) = channel(8, Duration::from_millis(50));
        let cancel = CancellationToken::new();
        for n in 0..5 {
            assert_eq!(tx.enqueue(item(n), &cancel).await, EnqueueOutcome::Accepted);
        }
        for n in 0..5 {
            let next = rx.recv().await.expect("item");
            assert_eq!(next.payload.as_ref(), &[n]);
        }
    }

    #[tokio::test]
    async fn full_queue_times_out_as_overload() {
        let (tx, mut rx) = channel(1, Duration::from_millis(30));
        let cancel = CancellationToken::new();
        assert!(tx.enqueue(item(1), &cancel).await.is_accepted());

        let started = tokio::time::Instant::now();
        assert_eq!(tx.enqueue(item(2), &cancel).await, EnqueueOutcome::Overloaded);
        assert!(started.elapsed() >= Duration::from_millis(30));

        // 超时的载荷不会进入队列
        assert_eq!(rx.recv().await.expect("first").payload.as_ref(), &[1]);
        assert!(rx.is_empty());
    }

    #[tokio::test]
    async fn cancellation_wins_over_free_slot() {
        let (tx, rx) = channel(4, Duration::from_millis(50));
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert_eq!(tx.enqueue(item(1), &cancel).await, EnqueueOutcome::Cancelled);
        assert!(rx.is_empty());
    }

    #[tokio::test]
    async fn cancellation_during_wait() {
        let (tx, _rx) = channel(1, Duration::from_secs(5));
        let cancel = CancellationToken::new();
        assert!(tx.enqueue(item(1), &cancel).await.is_accepted());

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });
        assert_eq!(tx.enqueue(item(2), &cancel).await, EnqueueOutcome::Cancelled);
    }

    #[tokio::test]
    async fn dropped_receiver_reports_closed() {
        let (tx, rx) = channel(1, Duration::from_millis(50));
        drop(rx);
        let cancel = CancellationToken::new();
        assert_eq!(tx.enqueue(item(1), &cancel).await, EnqueueOutcome::Closed);
        assert!(tx.is_closed());
    }
}
