use crate::{PushError, Pusher};
use async_trait::async_trait;
use domain::OutboundMessage;
use gateway_telemetry::{record_push_dropped, record_push_failure, record_push_success};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// 重试装饰器。
///
/// 最多尝试 `max(retry, 1)` 次，两次尝试之间等待 `interval`。
/// 全部失败后仍返回 `Ok(())`：消息被丢弃，只通过 `push_dropped` 日志与计数体现。
pub struct Retry {
    inner: Arc<dyn Pusher>,
    retry: i32,
    interval: Duration,
    name: String,
}

impl Retry {
    pub fn new(inner: Arc<dyn Pusher>, retry: i32, interval: Duration) -> Self {
        Self {
            inner,
            retry,
            interval,
            name: String::new(),
        }
    }

    /// 日志中用于标识下游的名称。
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn attempts(&self) -> u32 {
        self.retry.max(1) as u32
    }
}

#[async_trait]
impl Pusher for Retry {
    async fn push(&self, message: &OutboundMessage) -> Result<(), PushError> {
        let attempts = self.attempts();
        let mut last_error = None;
        for attempt in 1..=attempts {
            match self.inner.push(message).await {
                Ok(()) => {
                    record_push_success();
                    return Ok(());
                }
                Err(err) => {
                    record_push_failure();
                    debug!(
                        target: "gateway.push",
                        pusher = %self.name,
                        attempt,
                        attempts,
                        error = %err,
                        "push_attempt_failed"
                    );
                    last_error = Some(err);
                    if attempt < attempts && !self.interval.is_zero() {
                        tokio::time::sleep(self.interval).await;
                    }
                }
            }
        }

        record_push_dropped();
        warn!(
            target: "gateway.push",
            pusher = %self.name,
            listener_id = message.listener_id,
            attempts,
            error = %last_error.map(|err| err.to_string()).unwrap_or_default(),
            "push_dropped"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{DecodedMessage, QueueItem};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Flaky {
        calls: AtomicUsize,
        succeed_on: usize,
    }

    impl Flaky {
        fn new(succeed_on: usize) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                succeed_on,
            })
        }
    }

    #[async_trait]
    impl Pusher for Flaky {
        async fn push(&self, _message: &OutboundMessage) -> Result<(), PushError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call == self.succeed_on {
                Ok(())
            } else {
                Err(PushError::Write("sink down".to_string()))
            }
        }
    }

    fn message() -> OutboundMessage {
        OutboundMessage::from_item(&QueueItem::new(1, None, vec![1u8]), DecodedMessage::new())
    }

    #[tokio::test]
    async fn exhausted_retries_report_success() {
        let sink = Flaky::new(usize::MAX);
        let retry = Retry::new(sink.clone(), 3, Duration::from_millis(1));
        assert!(retry.push(&message()).await.is_ok());
        assert_eq!(sink.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_positive_retry_still_attempts_once() {
        for retry in [0, -5] {
            let sink = Flaky::new(usize::MAX);
            let pusher = Retry::new(sink.clone(), retry, Duration::from_millis(1));
            assert!(pusher.push(&message()).await.is_ok());
            assert_eq!(sink.calls.load(Ordering::SeqCst), 1);
        }
    }

    #[tokio::test]
    async fn stops_after_first_success() {
        let sink = Flaky::new(2);
        let retry = Retry::new(sink.clone(), 5, Duration::from_millis(1));
        assert!(retry.push(&message()).await.is_ok());
        assert_eq!(sink.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn waits_between_attempts() {
        let sink = Flaky::new(usize::MAX);
        let retry = Retry::new(sink.clone(), 3, Duration::from_millis(20));
        let started = tokio::time::Instant::now();
        retry.push(&message()).await.expect("push");
        assert!(started.elapsed() >= Duration::from_millis(40));
    }
}
