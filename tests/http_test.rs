// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! HTTP surface tests against the full router.

mod harness;

use axum::{
    body::{to_bytes, Body},
    extract::connect_info::MockConnectInfo,
    http::{header, Request, StatusCode},
    Router,
};
use harness::{mail_config, RecordingTransport};
use portfolio_contact::{
    config::{Config, RateLimitConfig},
    router, AppState, MemoryStore, SubmissionStore,
};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceExt;

struct TestApp {
    router: Router,
    state: Arc<AppState>,
    store: Arc<MemoryStore>,
    transport: Arc<RecordingTransport>,
}

fn test_app(config: Config) -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let transport = RecordingTransport::new();
    let state = Arc::new(AppState::new(config, store.clone(), transport.clone()).unwrap());
    let router = router(state.clone()).layer(MockConnectInfo(SocketAddr::from((
        [203, 0, 113, 7],
        40000,
    ))));
    TestApp {
        router,
        state,
        store,
        transport,
    }
}

fn default_config() -> Config {
    Config {
        mail: mail_config(),
        ..Default::default()
    }
}

fn contact_request(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/contact")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn valid_body() -> Value {
    json!({
        "name": "Jo",
        "email": "jo@x.com",
        "subject": "Hello there",
        "message": "This is a test message"
    })
}

#[tokio::test]
async fn test_submit_returns_created() {
    let app = test_app(default_config());

    let (status, body) = send(&app, contact_request(valid_body())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert!(body["message"].as_str().unwrap().starts_with("Thank you"));
    assert!(body["data"]["id"].is_u64());
    assert!(body["data"]["timestamp"].is_string());

    app.state.contact.deliveries().wait_idle().await;
    let records = app.store.load_all().await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id().as_u64(), body["data"]["id"].as_u64().unwrap());
    assert_eq!(app.transport.sent().len(), 2);
}

#[tokio::test]
async fn test_invalid_fields_return_bad_request() {
    let app = test_app(default_config());

    let (status, body) = send(
        &app,
        contact_request(json!({
            "name": "J",
            "email": "jo@x.com",
            "subject": "Hello there",
            "message": "This is a test message"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Name must be at least 2 characters");
    assert_eq!(
        body["errors"],
        json!({ "name": "Name must be at least 2 characters" })
    );
    assert_eq!(app.state.contact.deliveries().in_flight(), 0);
    assert!(app.store.load_all().await.unwrap().is_empty());
    assert!(app.transport.sent().is_empty());
}

#[tokio::test]
async fn test_missing_fields_are_field_errors() {
    let app = test_app(default_config());

    let (status, body) = send(&app, contact_request(json!({ "name": "Jo" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let errors = body["errors"].as_object().unwrap();
    assert_eq!(errors.len(), 3);
    assert!(errors.contains_key("email"));
    assert!(errors.contains_key("subject"));
    assert!(errors.contains_key("message"));
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let app = test_app(default_config());

    let request = Request::builder()
        .method("POST")
        .uri("/api/contact")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{ nope"))
        .unwrap();
    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Malformed request body");
}

#[tokio::test]
async fn test_contact_rate_limit_returns_too_many_requests() {
    let app = test_app(Config {
        contact_rate_limit: RateLimitConfig::strict(),
        ..default_config()
    });

    for _ in 0..3 {
        let (status, _) = send(&app, contact_request(valid_body())).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let response = app
        .router
        .clone()
        .oneshot(contact_request(valid_body()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = response.headers()[header::RETRY_AFTER]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(retry_after > 0 && retry_after <= 900);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(
        body["error"],
        "Too many contact attempts from this IP, please try again later."
    );

    app.state.contact.deliveries().wait_idle().await;
    assert_eq!(app.store.load_all().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_limited_client_body_is_not_parsed() {
    let app = test_app(Config {
        contact_rate_limit: RateLimitConfig::strict(),
        ..default_config()
    });

    for _ in 0..3 {
        send(&app, contact_request(valid_body())).await;
    }

    let request = Request::builder()
        .method("POST")
        .uri("/api/contact")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{ nope"))
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(app.state.metrics.submissions("malformed"), 0);
}

#[tokio::test]
async fn test_oversized_body_is_bad_request() {
    let mut config = default_config();
    config.http.max_body_bytes = 64;
    let app = test_app(config);

    let mut body = valid_body();
    body["message"] = Value::String("x".repeat(1024));
    let (status, body) = send(&app, contact_request(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Malformed request body");
    assert!(app.store.load_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_wildcard_origin_does_not_break_router() {
    let mut config = default_config();
    config.http.allowed_origins = vec!["*".to_string(), "https://a.example".to_string()];
    let app = test_app(config);

    let request = Request::builder()
        .uri("/health")
        .header(header::ORIGIN, "https://a.example")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "https://a.example"
    );
}

#[tokio::test]
async fn test_api_wide_rate_limit() {
    let app = test_app(Config {
        api_rate_limit: RateLimitConfig {
            window_minutes: 15,
            max_requests: 2,
        },
        ..default_config()
    });

    let health = || {
        Request::builder()
            .uri("/api/health")
            .body(Body::empty())
            .unwrap()
    };

    assert_eq!(send(&app, health()).await.0, StatusCode::OK);
    assert_eq!(send(&app, health()).await.0, StatusCode::OK);

    let (status, body) = send(&app, contact_request(valid_body())).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(
        body["error"],
        "Too many requests from this IP, please try again later."
    );
    assert!(app.store.load_all().await.unwrap().is_empty());

    // Outside /api is not limited.
    let request = Request::builder().uri("/healthz").body(Body::empty()).unwrap();
    assert_eq!(send(&app, request).await.0, StatusCode::OK);
}

#[tokio::test]
async fn test_api_health() {
    let app = test_app(Config {
        environment: "production".to_string(),
        ..default_config()
    });

    let request = Request::builder()
        .uri("/api/health")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "OK");
    assert_eq!(body["message"], "Portfolio API is running");
    assert_eq!(body["environment"], "production");
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_service_health() {
    let app = test_app(default_config());

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "portfolio-contact");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = test_app(default_config());
    send(&app, contact_request(valid_body())).await;
    app.state.contact.deliveries().wait_idle().await;

    let request = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("contact_submissions_total{outcome=\"accepted\"} 1"));
}

#[tokio::test]
async fn test_metrics_endpoint_can_be_disabled() {
    let mut config = default_config();
    config.metrics.enabled = false;
    let app = test_app(config);

    let request = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
