//! MQTT 监听：订阅路由中的主题过滤器，每条发布消息为一条载荷。
//!
//! 首次 ConnAck 前的连接错误视为启动失败；之后的错误由事件循环自动重连，
//! 每次重连成功都会重新订阅。

use crate::{Lifecycle, ListenError, Listener};
use async_trait::async_trait;
use domain::{ListenerConfig, MqttBrokerConfig, QueueItem, RouteNode};
use gateway_queue::{EnqueueOutcome, QueueSender};
use gateway_telemetry::record_payload_received;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS, SubscribeFilter};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const RECONNECT_DELAY: Duration = Duration::from_secs(1);

pub struct MqttListener {
    config: ListenerConfig,
    broker: MqttBrokerConfig,
    lifecycle: Lifecycle,
}

impl MqttListener {
    pub fn new(config: ListenerConfig, broker: MqttBrokerConfig) -> Self {
        Self {
            config,
            broker,
            lifecycle: Lifecycle::new(),
        }
    }

    fn options(&self) -> MqttOptions {
        let client_id = self.broker.client_id.clone().unwrap_or_else(|| {
            format!("gateway-listen-{}-{}", self.config.id, uuid::Uuid::new_v4().simple())
        });
        let mut options = MqttOptions::new(client_id, self.broker.host.clone(), self.broker.port);
        options.set_keep_alive(Duration::from_secs(30));
        if let (Some(username), Some(password)) = (&self.broker.username, &self.broker.password) {
            options.set_credentials(username, password);
        }
        options
    }

    fn filters(&self) -> Vec<SubscribeFilter> {
        let qos = match self.broker.qos {
            1 => QoS::AtLeastOnce,
            2 => QoS::ExactlyOnce,
            _ => QoS::AtMostOnce,
        };
        self.config
            .routes
            .iter()
            .map(|node| SubscribeFilter::new(node.path.clone(), qos))
            .collect()
    }
}

#[async_trait]
impl Listener for MqttListener {
    fn kind(&self) -> &'static str {
        "mqtt"
    }

    async fn run(&self, cancel: CancellationToken, queue: QueueSender) -> Result<(), ListenError> {
        let stop = self.lifecycle.link(&cancel);
        let _stop_guard = stop.clone().drop_guard();

        let filters = self.filters();
        if filters.is_empty() {
            warn!(target: "gateway.listen", listener_id = self.config.id, "mqtt_listener_no_topics");
        }
        let (client, mut eventloop) = AsyncClient::new(self.options(), 64);
        let mut connected = false;

        let result = loop {
            let event = tokio::select! {
                biased;
                _ = stop.cancelled() => break Ok(()),
                event = eventloop.poll() => event,
            };
            match event {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    connected = true;
                    info!(
                        target: "gateway.listen",
                        listener_id = self.config.id,
                        host = %self.broker.host,
                        port = self.broker.port,
                        topics = filters.len(),
                        "mqtt_listener_connected"
                    );
                    if !filters.is_empty() {
                        if let Err(err) = client.try_subscribe_many(filters.clone()) {
                            warn!(
                                target: "gateway.listen",
                                listener_id = self.config.id,
                                error = %err,
                                "mqtt_subscribe_failed"
                            );
                        }
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    record_payload_received();
                    let route = route_for(&self.config.routes, &publish.topic);
                    let item = QueueItem::new(self.config.id, route, publish.payload);
                    match queue.enqueue(item, &stop).await {
                        EnqueueOutcome::Accepted => {}
                        EnqueueOutcome::Overloaded => {
                            warn!(
                                target: "gateway.listen",
                                listener_id = self.config.id,
                                topic = %publish.topic,
                                "mqtt_payload_overloaded"
                            );
                        }
                        EnqueueOutcome::Cancelled | EnqueueOutcome::Closed => break Ok(()),
                    }
                }
                Ok(_) => {}
                Err(err) if !connected => break Err(ListenError::Connect(err.to_string())),
                Err(err) => {
                    warn!(
                        target: "gateway.listen",
                        listener_id = self.config.id,
                        error = %err,
                        "mqtt_listener_connection_error"
                    );
                    tokio::select! {
                        _ = stop.cancelled() => break Ok(()),
                        _ = tokio::time::sleep(RECONNECT_DELAY) => {}
                    }
                }
            }
        };

        let _ = client.try_disconnect();
        info!(target: "gateway.listen", listener_id = self.config.id, "mqtt_listener_stopped");
        result
    }

    async fn close(&self) -> Result<(), ListenError> {
        self.lifecycle.close();
        Ok(())
    }
}

/// 第一个匹配主题的路由过滤器即为该消息的路由。
fn route_for(routes: &[RouteNode], topic: &str) -> Option<String> {
    routes
        .iter()
        .find(|node| topic_matches(&node.path, topic))
        .map(|node| node.path.clone())
}

/// MQTT 主题过滤器匹配（`+` 单层、`#` 多层）；`$` 开头的主题不匹配首层通配符。
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    if topic.starts_with('$') && (filter.starts_with('+') || filter.starts_with('#')) {
        return false;
    }
    let mut levels = topic.split('/');
    for pattern in filter.split('/') {
        if pattern == "#" {
            return true;
        }
        match levels.next() {
            Some(level) if pattern == "+" || pattern == level => continue,
            _ => return false,
        }
    }
    levels.next().is_none()
}
