//! TCP 推送：持久连接，每条消息一行 JSON。
//!
//! 首次推送时建立连接；写失败后丢弃连接，下次推送重新连接。

use crate::{AnyWriter, PushError};
use async_trait::async_trait;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{info, warn};

pub struct TcpPusher {
    address: String,
    write_timeout: Duration,
    connection: Mutex<Option<TcpStream>>,
}

impl TcpPusher {
    pub fn new(address: impl Into<String>, write_timeout: Duration) -> Self {
        Self {
            address: address.into(),
            write_timeout,
            connection: Mutex::new(None),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    async fn connect(&self) -> Result<TcpStream, PushError> {
        let stream = tokio::time::timeout(self.write_timeout, TcpStream::connect(&self.address))
            .await
            .map_err(|_| PushError::Timeout(self.write_timeout.as_millis()))?
            .map_err(|err| PushError::Connect(format!("{}: {}", self.address, err)))?;
        let _ = stream.set_nodelay(true);
        info!(target: "gateway.push", address = %self.address, "tcp_push_connected");
        Ok(stream)
    }
}

#[async_trait]
impl AnyWriter for TcpPusher {
    async fn write_any(&self, value: serde_json::Value) -> Result<(), PushError> {
        let mut line =
            serde_json::to_vec(&value).map_err(|err| PushError::Encode(err.to_string()))?;
        line.push(b'\n');

        let mut connection = self.connection.lock().await;
        if connection.is_none() {
            *connection = Some(self.connect().await?);
        }
        let Some(stream) = connection.as_mut() else {
            return Err(PushError::Connect(self.address.clone()));
        };

        let written = tokio::time::timeout(self.write_timeout, async {
            stream.write_all(&line).await?;
            stream.flush().await
        })
        .await;

        match written {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => {
                *connection = None;
                warn!(target: "gateway.push", address = %self.address, error = %err, "tcp_push_write_failed");
                Err(PushError::Write(err.to_string()))
            }
            Err(_) => {
                *connection = None;
                Err(PushError::Timeout(self.write_timeout.as_millis()))
            }
        }
    }
}
