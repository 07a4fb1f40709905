use axum::body::Body;
use axum::http::{Request, StatusCode};
use domain::{ListenerConfig, ListenerKind, RouteNode};
use gateway_ingest::{HttpListener, Listener};
use gateway_queue::channel;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

fn config(routes: Vec<RouteNode>) -> ListenerConfig {
    ListenerConfig {
        id: 11,
        name: "http".to_string(),
        host: "127.0.0.1".to_string(),
        port: 0,
        enabled: true,
        routes,
        kind: ListenerKind::Http,
        push_ids: Vec::new(),
    }
}

fn post(uri: &str, body: &'static [u8]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::from(body))
        .expect("request")
}

#[tokio::test]
async fn accepted_payload_carries_route() {
    let listener = HttpListener::new(
        config(vec![RouteNode::new("/meter", "dlt645"), RouteNode::new("plc", "modbus_tcp")]),
        Duration::from_secs(1),
    )
    .expect("listener");
    let (queue, mut rx) = channel(4, Duration::from_millis(50));
    let app = listener.router(queue, CancellationToken::new());

    let response = app.clone().oneshot(post("/plc", b"\x01\x03")).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let item = rx.recv().await.expect("item");
    assert_eq!(item.listener_id, 11);
    assert_eq!(item.route.as_deref(), Some("/plc"));
    assert_eq!(item.payload.as_ref(), b"\x01\x03");

    let get = Request::builder().uri("/meter").body(Body::empty()).expect("request");
    let response = app.clone().oneshot(get).await.expect("response");
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

    let response = app.oneshot(post("/unknown", b"x")).await.expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn full_queue_answers_503() {
    let listener =
        HttpListener::new(config(vec![RouteNode::new("/m", "pass")]), Duration::from_secs(1))
            .expect("listener");
    let (queue, rx) = channel(1, Duration::from_millis(20));
    let app = listener.router(queue, CancellationToken::new());

    let first = app.clone().oneshot(post("/m", b"1")).await.expect("response");
    assert_eq!(first.status(), StatusCode::OK);
    let second = app.oneshot(post("/m", b"2")).await.expect("response");
    assert_eq!(second.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(rx.len(), 1);
}

#[tokio::test]
async fn stopping_listener_answers_503() {
    let listener =
        HttpListener::new(config(vec![RouteNode::new("/m", "pass")]), Duration::from_secs(1))
            .expect("listener");
    let (queue, rx) = channel(4, Duration::from_secs(5));
    let stop = CancellationToken::new();
    stop.cancel();
    let response = listener
        .router(queue, stop)
        .oneshot(post("/m", b"1"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(rx.is_empty());
}

#[tokio::test]
async fn without_routes_any_post_is_accepted() {
    let listener = HttpListener::new(config(Vec::new()), Duration::from_secs(1)).expect("listener");
    let (queue, mut rx) = channel(4, Duration::from_millis(50));
    let app = listener.router(queue, CancellationToken::new());

    let response = app.clone().oneshot(post("/any/path", b"x")).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(rx.recv().await.expect("item").route, None);

    let get = Request::builder().uri("/any").body(Body::empty()).expect("request");
    let response = app.oneshot(get).await.expect("response");
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn serves_over_socket_and_stops_on_cancel() {
    let listener = Arc::new(
        HttpListener::new(config(vec![RouteNode::new("/m", "pass")]), Duration::from_secs(1))
            .expect("listener"),
    );
    let (queue, mut rx) = channel(4, Duration::from_millis(50));
    let cancel = CancellationToken::new();
    let running = {
        let listener = listener.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { listener.run(cancel, queue).await })
    };

    let addr = listener.local_addr().await.expect("bound");
    let mut stream = TcpStream::connect(addr).await.expect("connect");
    stream
        .write_all(
            b"POST /m HTTP/1.1\r\nHost: gw\r\nContent-Length: 5\r\nConnection: close\r\n\r\nhello",
        )
        .await
        .expect("write");
    let mut response = String::new();
    stream.read_to_string(&mut response).await.expect("read");
    assert!(response.starts_with("HTTP/1.1 200"), "{response}");
    assert_eq!(rx.recv().await.expect("item").payload.as_ref(), b"hello");

    cancel.cancel();
    let result = tokio::time::timeout(Duration::from_secs(3), running)
        .await
        .expect("stops")
        .expect("join");
    assert!(result.is_ok());
}

#[tokio::test]
async fn close_stops_running_listener() {
    let listener = Arc::new(
        HttpListener::new(config(Vec::new()), Duration::from_secs(1)).expect("listener"),
    );
    let (queue, _rx) = channel(4, Duration::from_millis(50));
    let running = {
        let listener = listener.clone();
        tokio::spawn(async move { listener.run(CancellationToken::new(), queue).await })
    };
    listener.local_addr().await.expect("bound");
    listener.close().await.expect("close");
    let result = tokio::time::timeout(Duration::from_secs(3), running)
        .await
        .expect("stops")
        .expect("join");
    assert!(result.is_ok());
}

#[tokio::test]
async fn occupied_port_fails_to_bind() {
    let occupied = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let mut cfg = config(Vec::new());
    cfg.port = occupied.local_addr().expect("addr").port();
    let listener = HttpListener::new(cfg, Duration::from_secs(1)).expect("listener");
    let (queue, _rx) = channel(1, Duration::from_millis(10));
    let result = listener.run(CancellationToken::new(), queue).await;
    assert!(matches!(result, Err(gateway_ingest::ListenError::Bind { .. })));
}

#[tokio::test]
async fn oversized_body_answers_413() {
    let listener =
        HttpListener::new(config(vec![RouteNode::new("/m", "pass")]), Duration::from_secs(1))
            .expect("listener")
            .with_max_body(4);
    let (queue, rx) = channel(4, Duration::from_millis(50));
    let app = listener.router(queue, CancellationToken::new());

    let response = app.clone().oneshot(post("/m", b"0123456789")).await.expect("response");
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(rx.is_empty());

    let response = app.oneshot(post("/m", b"0123")).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(rx.len(), 1);
}

#[tokio::test]
async fn default_limit_applies_without_routes() {
    let listener = HttpListener::new(config(Vec::new()), Duration::from_secs(1)).expect("listener");
    let (queue, rx) = channel(4, Duration::from_millis(50));
    let body = vec![0u8; gateway_ingest::DEFAULT_MAX_BODY_BYTES + 1];
    let request = Request::builder()
        .method("POST")
        .uri("/any")
        .body(Body::from(body))
        .expect("request");
    let response = listener
        .router(queue, CancellationToken::new())
        .oneshot(request)
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(rx.is_empty());
}

#[tokio::test]
async fn disconnected_client_does_not_enqueue_later() {
    let listener = Arc::new(
        HttpListener::new(config(vec![RouteNode::new("/m", "pass")]), Duration::from_secs(1))
            .expect("listener"),
    );
    let (queue, mut rx) = channel(1, Duration::from_secs(5));
    let cancel = CancellationToken::new();
    let running = {
        let listener = listener.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { listener.run(cancel, queue).await })
    };
    let addr = listener.local_addr().await.expect("bound");

    let mut first = TcpStream::connect(addr).await.expect("connect");
    first
        .write_all(b"POST /m HTTP/1.1\r\nHost: gw\r\nContent-Length: 1\r\nConnection: close\r\n\r\n1")
        .await
        .expect("write");
    let mut response = String::new();
    first.read_to_string(&mut response).await.expect("read");
    assert!(response.starts_with("HTTP/1.1 200"), "{response}");

    // 队列已满，第二个请求阻塞在入队上；客户端随即断开
    let mut second = TcpStream::connect(addr).await.expect("connect");
    second
        .write_all(b"POST /m HTTP/1.1\r\nHost: gw\r\nContent-Length: 1\r\n\r\n2")
        .await
        .expect("write");
    tokio::time::sleep(Duration::from_millis(100)).await;
    drop(second);
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(rx.recv().await.expect("item").payload.as_ref(), b"1");
    let late = tokio::time::timeout(Duration::from_millis(300), rx.recv()).await;
    assert!(late.is_err(), "abandoned request was enqueued: {late:?}");

    cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(3), running).await;
}
