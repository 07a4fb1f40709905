//! WebSocket 推送：持久连接，每条消息一个 JSON 文本帧。
//!
//! 后台读任务持续消费对端帧；收到 Close、读错误或连接结束后
//! 连接被标记失效，下一次推送重新建连。

use crate::{AnyWriter, PushError};
use async_trait::async_trait;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct Connection {
    sink: SplitSink<Socket, Message>,
    alive: Arc<AtomicBool>,
    reader: JoinHandle<()>,
}

impl Connection {
    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

pub struct WebSocketPusher {
    url: String,
    write_timeout: Duration,
    connection: Mutex<Option<Connection>>,
}

impl WebSocketPusher {
    pub fn new(url: impl Into<String>, write_timeout: Duration) -> Self {
        Self {
            url: url.into(),
            write_timeout,
            connection: Mutex::new(None),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn connect(&self) -> Result<Connection, PushError> {
        let (socket, _) = tokio::time::timeout(self.write_timeout, connect_async(self.url.as_str()))
            .await
            .map_err(|_| PushError::Timeout(self.write_timeout.as_millis()))?
            .map_err(|err| PushError::Connect(format!("{}: {}", self.url, err)))?;
        info!(target: "gateway.push", url = %self.url, "websocket_push_connected");

        let (sink, mut stream) = socket.split();
        let alive = Arc::new(AtomicBool::new(true));
        let reader = {
            let alive = alive.clone();
            let url = self.url.clone();
            tokio::spawn(async move {
                loop {
                    match stream.next().await {
                        Some(Ok(Message::Close(frame))) => {
                            info!(target: "gateway.push", url = %url, frame = ?frame, "websocket_push_closed_by_peer");
                            break;
                        }
                        // Ping 的应答由 tungstenite 在下一次写入时带出
                        Some(Ok(_)) => {}
                        Some(Err(err)) => {
                            warn!(target: "gateway.push", url = %url, error = %err, "websocket_push_read_failed");
                            break;
                        }
                        None => break,
                    }
                }
                alive.store(false, Ordering::SeqCst);
                debug!(target: "gateway.push", url = %url, "websocket_push_reader_stopped");
            })
        };
        Ok(Connection {
            sink,
            alive,
            reader,
        })
    }
}

#[async_trait]
impl AnyWriter for WebSocketPusher {
    async fn write_any(&self, value: serde_json::Value) -> Result<(), PushError> {
        let text = serde_json::to_string(&value).map_err(|err| PushError::Encode(err.to_string()))?;

        let mut connection = self.connection.lock().await;
        if connection.as_ref().is_some_and(|current| !current.is_alive()) {
            *connection = None;
        }
        if connection.is_none() {
            *connection = Some(self.connect().await?);
        }
        let Some(current) = connection.as_mut() else {
            return Err(PushError::Connect(self.url.clone()));
        };

        let sent = tokio::time::timeout(self.write_timeout, current.sink.send(Message::text(text))).await;
        match sent {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => {
                *connection = None;
                warn!(target: "gateway.push", url = %self.url, error = %err, "websocket_push_write_failed");
                Err(PushError::Write(err.to_string()))
            }
            Err(_) => {
                *connection = None;
                Err(PushError::Timeout(self.write_timeout.as_millis()))
            }
        }
    }
}
