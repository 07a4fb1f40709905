use domain::{DecodedMessage, MqttBrokerConfig, OutboundMessage, PushConfig, PushKind, QueueItem};
use futures_util::StreamExt;
use gateway_push::{
    AnyWriterPusher, MqttPusher, PushError, Pusher, TcpPusher, WebSocketPusher, build_pusher,
};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

fn message(listener_id: i64) -> OutboundMessage {
    let mut data = DecodedMessage::new();
    data.insert("voltage".to_string(), json!(220.5));
    OutboundMessage::from_item(
        &QueueItem::new(listener_id, Some("/meter".to_string()), vec![0x68u8, 0x16]),
        data,
    )
}

#[tokio::test]
async fn tcp_pusher_writes_json_lines_and_reconnects() {
    let server = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let address = server.local_addr().expect("addr").to_string();
    let pusher = AnyWriterPusher::new(TcpPusher::new(address, Duration::from_secs(1)));

    // 第一条连接：读一行后关闭
    let first = tokio::spawn(async move {
        let (stream, _) = server.accept().await.expect("accept");
        let mut lines = BufReader::new(stream).lines();
        let line = lines.next_line().await.expect("read").expect("line");
        (server, line)
    });
    pusher.push(&message(1)).await.expect("push");
    let (server, line) = first.await.expect("join");
    let value: Value = serde_json::from_str(&line).expect("json");
    assert_eq!(value["listener_id"], 1);
    assert_eq!(value["raw"], "6816");
    assert_eq!(value["data"]["voltage"], 220.5);

    // 对端已关闭：写入最终失败，之后的推送重新建立连接
    let second = tokio::spawn(async move {
        let (stream, _) = server.accept().await.expect("accept");
        let mut lines = BufReader::new(stream).lines();
        lines.next_line().await.expect("read").expect("line")
    });
    for _ in 0..10 {
        let _ = pusher.push(&message(2)).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        if second.is_finished() {
            break;
        }
    }
    let line = tokio::time::timeout(Duration::from_secs(2), second)
        .await
        .expect("second connection")
        .expect("join");
    assert!(line.contains("\"listener_id\":2"));
}

#[tokio::test]
async fn websocket_pusher_sends_text_frames() {
    let server = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let url = format!("ws://{}", server.local_addr().expect("addr"));
    let receiver = tokio::spawn(async move {
        let (stream, _) = server.accept().await.expect("accept");
        let mut socket = tokio_tungstenite::accept_async(stream).await.expect("handshake");
        let mut texts = Vec::new();
        while texts.len() < 2 {
            match socket.next().await {
                Some(Ok(Message::Text(text))) => texts.push(text.to_string()),
                Some(Ok(_)) => continue,
                _ => break,
            }
        }
        texts
    });

    let pusher = AnyWriterPusher::new(WebSocketPusher::new(url, Duration::from_secs(1)));
    pusher.push(&message(7)).await.expect("first");
    pusher.push(&message(8)).await.expect("second");

    let texts = tokio::time::timeout(Duration::from_secs(2), receiver)
        .await
        .expect("receiver")
        .expect("join");
    assert_eq!(texts.len(), 2);
    let first: Value = serde_json::from_str(&texts[0]).expect("json");
    assert_eq!(first["listener_id"], 7);
    assert_eq!(first["route"], "/meter");
}

#[tokio::test]
async fn built_pusher_swallows_unreachable_sink() {
    // 绑定后立即释放端口，使连接被拒绝
    let address = {
        let spare = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        spare.local_addr().expect("addr").to_string()
    };
    let config = PushConfig {
        id: 1,
        name: "down".to_string(),
        enabled: true,
        retry: 2,
        retry_interval_ms: 5,
        kind: PushKind::Tcp { address },
    };
    let pusher = build_pusher(&config).expect("build");
    assert!(pusher.push(&message(1)).await.is_ok());
}

#[tokio::test]
async fn websocket_pusher_reconnects_after_peer_close() {
    let server = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let url = format!("ws://{}", server.local_addr().expect("addr"));
    let receiver = tokio::spawn(async move {
        let (stream, _) = server.accept().await.expect("accept");
        let mut first = tokio_tungstenite::accept_async(stream).await.expect("handshake");
        let text = loop {
            match first.next().await {
                Some(Ok(Message::Text(text))) => break text.to_string(),
                Some(Ok(_)) => continue,
                other => panic!("first connection ended early: {other:?}"),
            }
        };
        first.close(None).await.expect("close");

        let (stream, _) = server.accept().await.expect("accept again");
        let mut second = tokio_tungstenite::accept_async(stream).await.expect("handshake");
        let again = loop {
            match second.next().await {
                Some(Ok(Message::Text(text))) => break text.to_string(),
                Some(Ok(_)) => continue,
                other => panic!("second connection ended early: {other:?}"),
            }
        };
        (text, again)
    });

    let pusher = AnyWriterPusher::new(WebSocketPusher::new(url, Duration::from_secs(1)));
    pusher.push(&message(8)).await.expect("first");
    // 等待对端 Close 帧被读任务消费
    tokio::time::sleep(Duration::from_millis(300)).await;
    pusher.push(&message(9)).await.expect("after close");

    let (first, second) = tokio::time::timeout(Duration::from_secs(3), receiver)
        .await
        .expect("receiver")
        .expect("join");
    assert!(first.contains("\"listener_id\":8"));
    assert!(second.contains("\"listener_id\":9"));
}

#[tokio::test]
async fn mqtt_pusher_fails_fast_while_broker_is_down() {
    let port = {
        let spare = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        spare.local_addr().expect("addr").port()
    };
    let broker = MqttBrokerConfig {
        host: "127.0.0.1".to_string(),
        port,
        username: None,
        password: None,
        client_id: None,
        qos: 1,
    };
    let pusher = AnyWriterPusher::new(
        MqttPusher::connect(&broker, "gw/out", Duration::from_millis(500)).expect("client"),
    );
    for _ in 0..20 {
        let result = tokio::time::timeout(Duration::from_secs(1), pusher.push(&message(3)))
            .await
            .expect("push returned in time");
        assert!(matches!(result, Err(PushError::Connect(_))), "{result:?}");
    }
    assert!(!pusher.writer().is_connected());

    let config = PushConfig {
        id: 4,
        name: "mqtt".to_string(),
        enabled: true,
        retry: 1,
        retry_interval_ms: 5,
        kind: PushKind::Mqtt {
            broker,
            topic: "gw/out".to_string(),
        },
    };
    let retried = build_pusher(&config).expect("build");
    for _ in 0..20 {
        let result = tokio::time::timeout(Duration::from_secs(1), retried.push(&message(3)))
            .await
            .expect("retried push returned in time");
        assert!(result.is_ok());
    }
}
