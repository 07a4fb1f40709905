//! 脚本监听：按固定间隔调用脚本中的 `poll()`，返回值转为载荷入队。

use crate::{Lifecycle, ListenError, Listener};
use async_trait::async_trait;
use bytes::Bytes;
use domain::{ListenerConfig, QueueItem};
use gateway_queue::{EnqueueOutcome, QueueSender};
use gateway_script::{Program, ScriptReturn};
use gateway_telemetry::record_payload_received;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub const POLL_FN: &str = "poll";

const MIN_INTERVAL: Duration = Duration::from_millis(10);

pub struct ScriptListener {
    config: ListenerConfig,
    program: Program,
    interval: Duration,
    lifecycle: Lifecycle,
}

impl ScriptListener {
    pub fn new(config: ListenerConfig, program: Program, interval: Duration) -> Self {
        Self {
            config,
            program,
            interval: interval.max(MIN_INTERVAL),
            lifecycle: Lifecycle::new(),
        }
    }
}

#[async_trait]
impl Listener for ScriptListener {
    fn kind(&self) -> &'static str {
        "script"
    }

    async fn run(&self, cancel: CancellationToken, queue: QueueSender) -> Result<(), ListenError> {
        let stop = self.lifecycle.link(&cancel);
        let _stop_guard = stop.clone().drop_guard();

        if !self.program.has_function(POLL_FN).await? {
            return Err(ListenError::Config(format!(
                "script {} has no {POLL_FN}() function",
                self.program.name()
            )));
        }

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(
            target: "gateway.listen",
            listener_id = self.config.id,
            script = %self.program.name(),
            interval_ms = self.interval.as_millis() as u64,
            "script_listener_started"
        );

        'poll: loop {
            tokio::select! {
                biased;
                _ = stop.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let returned = match self.program.call(POLL_FN, Vec::new()).await {
                Ok(returned) => returned,
                Err(err) => {
                    warn!(
                        target: "gateway.listen",
                        listener_id = self.config.id,
                        error = %err,
                        "script_poll_failed"
                    );
                    continue;
                }
            };
            for payload in payloads_from(returned) {
                record_payload_received();
                match queue.enqueue(QueueItem::new(self.config.id, None, payload), &stop).await {
                    EnqueueOutcome::Accepted => {}
                    EnqueueOutcome::Overloaded => {
                        warn!(
                            target: "gateway.listen",
                            listener_id = self.config.id,
                            "script_payload_overloaded"
                        );
                    }
                    EnqueueOutcome::Cancelled | EnqueueOutcome::Closed => break 'poll,
                }
            }
        }

        info!(target: "gateway.listen", listener_id = self.config.id, "script_listener_stopped");
        Ok(())
    }

    async fn close(&self) -> Result<(), ListenError> {
        self.lifecycle.close();
        Ok(())
    }
}

/// 把 `poll()` 的返回值转为载荷：数组逐元素产生载荷，undefined / null 不产生载荷。
pub fn payloads_from(returned: ScriptReturn) -> Vec<Bytes> {
    match returned {
        ScriptReturn::List(items) => items.into_iter().filter_map(single_payload).collect(),
        other => single_payload(other).into_iter().collect(),
    }
}

fn single_payload(value: ScriptReturn) -> Option<Bytes> {
    match value {
        ScriptReturn::Undefined => None,
        ScriptReturn::Text(text) => Some(Bytes::from(text)),
        ScriptReturn::Bytes(bytes) => Some(Bytes::from(bytes)),
        ScriptReturn::Number(n) => Some(Bytes::from(n.to_string())),
        ScriptReturn::Bool(b) => Some(Bytes::from(b.to_string())),
        ScriptReturn::Json(value) => serde_json::to_vec(&value).ok().map(Bytes::from),
        list @ ScriptReturn::List(_) => serde_json::to_vec(&list.into_json()).ok().map(Bytes::from),
    }
}
