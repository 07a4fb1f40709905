//! MQTT 推送：把消息 JSON 发布到固定主题。
//!
//! 与 broker 断开期间推送立即失败，不在客户端请求队列上阻塞。

use crate::{AnyWriter, PushError};
use async_trait::async_trait;
use domain::MqttBrokerConfig;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub struct MqttPusher {
    client: AsyncClient,
    topic: String,
    qos: QoS,
    broker: String,
    write_timeout: Duration,
    connected: Arc<AtomicBool>,
    eventloop: JoinHandle<()>,
}

impl MqttPusher {
    /// 建立客户端并在后台驱动事件循环（断线由 rumqttc 自动重连）。
    pub fn connect(
        broker: &MqttBrokerConfig,
        topic: &str,
        write_timeout: Duration,
    ) -> Result<Self, PushError> {
        if topic.is_empty() {
            return Err(PushError::Config("mqtt topic is empty".to_string()));
        }
        let client_id = broker
            .client_id
            .clone()
            .unwrap_or_else(|| format!("gateway-push-{}", uuid::Uuid::new_v4()));
        let mut options = MqttOptions::new(client_id, broker.host.clone(), broker.port);
        options.set_keep_alive(Duration::from_secs(30));
        if let (Some(username), Some(password)) = (&broker.username, &broker.password) {
            options.set_credentials(username, password);
        }

        let (client, mut eventloop) = AsyncClient::new(options, 10);
        let connected = Arc::new(AtomicBool::new(false));
        let host = broker.host.clone();
        let eventloop = {
            let connected = connected.clone();
            tokio::spawn(async move {
                loop {
                    match eventloop.poll().await {
                        Ok(Event::Incoming(Packet::ConnAck(_))) => {
                            connected.store(true, Ordering::SeqCst);
                            info!(target: "gateway.push", host = %host, "mqtt_push_connected");
                        }
                        Ok(_) => {}
                        Err(err) => {
                            if connected.swap(false, Ordering::SeqCst) {
                                warn!(target: "gateway.push", host = %host, error = %err, "mqtt_push_disconnected");
                            } else {
                                warn!(target: "gateway.push", host = %host, error = %err, "mqtt_push_eventloop_error");
                            }
                            tokio::time::sleep(Duration::from_secs(1)).await;
                        }
                    }
                }
            })
        };
        info!(target: "gateway.push", host = %broker.host, port = broker.port, topic, "mqtt_push_started");

        Ok(Self {
            client,
            topic: topic.to_string(),
            qos: qos_from_u8(broker.qos),
            broker: format!("{}:{}", broker.host, broker.port),
            write_timeout,
            connected,
            eventloop,
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

impl Drop for MqttPusher {
    fn drop(&mut self) {
        self.eventloop.abort();
    }
}

#[async_trait]
impl AnyWriter for MqttPusher {
    async fn write_any(&self, value: serde_json::Value) -> Result<(), PushError> {
        if !self.is_connected() {
            return Err(PushError::Connect(format!("mqtt broker {} not connected", self.broker)));
        }
        let payload = serde_json::to_vec(&value).map_err(|err| PushError::Encode(err.to_string()))?;
        let publish = self
            .client
            .publish(self.topic.clone(), self.qos, false, payload);
        match tokio::time::timeout(self.write_timeout, publish).await {
            Ok(result) => result.map_err(|err| PushError::Write(err.to_string())),
            Err(_) => Err(PushError::Timeout(self.write_timeout.as_millis())),
        }
    }
}

pub(crate) fn qos_from_u8(value: u8) -> QoS {
    match value {
        1 => QoS::AtLeastOnce,
        2 => QoS::ExactlyOnce,
        _ => QoS::AtMostOnce,
    }
}
