//! 路由定义
//!
//! 路由包括：
//! - 健康检查：/health
//! - 指标：/metrics
//! - 解析器与脚本：/decode/*
//! - 监听配置：/listen/*
//! - 推送配置：/push/*
//!
//! 业务路由同时挂在 / 与 /api 两种前缀下。

use super::AppState;
use super::handlers::*;
use crate::middleware::request_context;
use axum::{
    Router, middleware,
    routing::{get, put},
};
use tower_http::trace::TraceLayer;

/// 创建 API 路由
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .route("/metrics", get(get_metrics))
        .route("/decode/list", get(list_decoders))
        .route("/decode/script", get(list_scripts).post(create_script))
        .route(
            "/decode/script/:id",
            put(update_script).delete(delete_script),
        )
        .route("/listen", get(list_listeners).post(create_listener))
        .route(
            "/listen/:id",
            put(update_listener).delete(delete_listener),
        )
        .route("/listen/:id/enable", put(enable_listener))
        .route("/listen/:id/disable", put(disable_listener))
        .route("/listen/:id/status", get(listener_status))
        .route("/push", get(list_pushes).post(create_push))
        .route("/push/:id", put(update_push).delete(delete_push))
}

/// 完整应用：路由 + 状态 + 请求追踪
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(create_api_router())
        .nest("/api", create_api_router())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(request_context))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::test_state;
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use std::time::Duration;
    use tower::ServiceExt;

    async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(body) => {
                builder = builder.header("content-type", "application/json");
                Body::from(body.to_string())
            }
            None => Body::empty(),
        };
        let response = app
            .clone()
            .oneshot(builder.body(body).expect("request"))
            .await
            .expect("response");
        let status = response.status();
        let bytes = response.into_body().collect().await.expect("body").to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json")
        };
        (status, value)
    }

    #[tokio::test]
    async fn health_carries_request_ids() {
        let app = build_app(test_state());
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        assert!(response.headers().contains_key("x-trace-id"));
    }

    #[tokio::test]
    async fn decoder_list_includes_fixed_protocols() {
        let app = build_app(test_state());
        let (status, body) = call(&app, Method::GET, "/api/decode/list", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        let keys: Vec<&str> = body["data"]
            .as_array()
            .expect("array")
            .iter()
            .filter_map(|item| item["key"].as_str())
            .collect();
        assert!(keys.contains(&"pass"));
        assert!(keys.contains(&"dlt645"));
    }

    #[tokio::test]
    async fn script_lifecycle_updates_the_catalog() {
        let app = build_app(test_state());
        let (status, body) = call(
            &app,
            Method::POST,
            "/api/decode/script",
            Some(json!({"name": "len", "script": "function decode(d) { return d.length; }"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let id = body["data"]["id"].as_i64().expect("id");
        assert!(id > 0);

        let (_, list) = call(&app, Method::GET, "/decode/list", None).await;
        let key = format!("script{id}");
        assert!(list["data"].as_array().expect("array").iter().any(|item| item["key"] == key.as_str()));

        let (status, body) = call(
            &app,
            Method::PUT,
            &format!("/api/decode/script/{id}"),
            Some(json!({"name": "len", "script": "function ("})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "SCRIPT.INVALID");

        let (status, _) = call(&app, Method::DELETE, &format!("/api/decode/script/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        let (_, list) = call(&app, Method::GET, "/decode/list", None).await;
        assert!(!list["data"].as_array().expect("array").iter().any(|item| item["key"] == key.as_str()));

        let (status, body) = call(&app, Method::DELETE, &format!("/api/decode/script/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "RESOURCE.NOT_FOUND");
    }

    #[tokio::test]
    async fn broken_script_is_not_stored() {
        let app = build_app(test_state());
        let (status, _) = call(
            &app,
            Method::POST,
            "/api/decode/script",
            Some(json!({"name": "bad", "script": "var x = 1;"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (_, list) = call(&app, Method::GET, "/api/decode/script", None).await;
        assert!(list["data"].as_array().expect("array").is_empty());
    }

    #[tokio::test]
    async fn listener_enable_disable_and_status() {
        let state = test_state();
        let supervisor = state.supervisor.clone();
        let app = build_app(state);

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/listen",
            Some(json!({
                "name": "meters",
                "host": "127.0.0.1",
                "port": 0,
                "enabled": false,
                "routes": [{"path": "/up", "decoder": "pass"}],
                "kind": {"type": "http"}
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let id = body["data"]["id"].as_i64().expect("id");

        let (_, body) = call(&app, Method::GET, &format!("/api/listen/{id}/status"), None).await;
        assert_eq!(body["data"]["state"], "stopped");

        let (status, body) = call(&app, Method::PUT, &format!("/api/listen/{id}/enable"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["state"], "running");
        assert_eq!(supervisor.running_listeners(), vec![id]);

        let (_, body) = call(&app, Method::GET, "/api/listen", None).await;
        assert_eq!(body["data"][0]["enabled"], true);

        let (status, body) = call(&app, Method::PUT, &format!("/api/listen/{id}/disable"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["state"], "stopped");
        assert!(supervisor.running_listeners().is_empty());

        let (status, _) = call(&app, Method::DELETE, &format!("/api/listen/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = call(&app, Method::GET, &format!("/api/listen/{id}/status"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn listener_with_unknown_decoder_is_rolled_back() {
        let app = build_app(test_state());
        let (status, body) = call(
            &app,
            Method::POST,
            "/api/listen",
            Some(json!({
                "name": "bad",
                "enabled": true,
                "routes": [{"path": "/up", "decoder": "script42"}],
                "kind": {"type": "http"}
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "DECODER.UNKNOWN");
        let (_, list) = call(&app, Method::GET, "/api/listen", None).await;
        assert!(list["data"].as_array().expect("array").is_empty());
    }

    #[tokio::test]
    async fn failed_bind_shows_in_status() {
        let occupied = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = occupied.local_addr().expect("addr").port();
        let app = build_app(test_state());
        let (status, body) = call(
            &app,
            Method::POST,
            "/api/listen",
            Some(json!({
                "name": "clash",
                "host": "127.0.0.1",
                "port": port,
                "enabled": true,
                "kind": {"type": "tcp"}
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let id = body["data"]["id"].as_i64().expect("id");

        let mut state = Value::Null;
        for _ in 0..50 {
            let (_, body) = call(&app, Method::GET, &format!("/api/listen/{id}/status"), None).await;
            state = body["data"].clone();
            if state["state"] == "failed" {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(state["state"], "failed");
        assert!(state["error"].as_str().is_some());
    }

    #[tokio::test]
    async fn push_crud() {
        let state = test_state();
        let registry = state.supervisor.registry().clone();
        let app = build_app(state);
        let (status, body) = call(
            &app,
            Method::POST,
            "/api/push",
            Some(json!({
                "name": "collector",
                "retry": 2,
                "retry_interval_ms": 10,
                "kind": {"type": "tcp", "address": "127.0.0.1:9"}
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let id = body["data"]["id"].as_i64().expect("id");
        assert_eq!(registry.keys("pusher"), vec![id.to_string()]);

        let (status, body) = call(
            &app,
            Method::PUT,
            &format!("/api/push/{id}"),
            Some(json!({
                "name": "collector",
                "enabled": false,
                "kind": {"type": "tcp", "address": "127.0.0.1:9"}
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["enabled"], false);
        assert!(registry.keys("pusher").is_empty());

        let (status, _) = call(&app, Method::PUT, "/api/push/999", Some(json!({
            "name": "ghost",
            "kind": {"type": "tcp", "address": "127.0.0.1:9"}
        })))
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = call(&app, Method::DELETE, &format!("/api/push/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        let (_, list) = call(&app, Method::GET, "/push", None).await;
        assert!(list["data"].as_array().expect("array").is_empty());
    }

    #[tokio::test]
    async fn blank_name_is_rejected() {
        let app = build_app(test_state());
        let (status, body) = call(
            &app,
            Method::POST,
            "/api/push",
            Some(json!({"name": "  ", "kind": {"type": "tcp", "address": "127.0.0.1:9"}})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID.REQUEST");
    }

    #[tokio::test]
    async fn metrics_snapshot_is_served() {
        let app = build_app(test_state());
        let (status, body) = call(&app, Method::GET, "/api/metrics", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["data"]["pushDropped"].is_u64());
    }
}
