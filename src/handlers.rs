// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! HTTP handlers for the contact service.
//!
//! Every `/api` route sits behind a loose per-address limiter. The contact
//! route additionally goes through its own, usually stricter, limiter inside
//! [`ContactService`].

use crate::config::{Config, HttpConfig};
use crate::error::{retry_after_secs, ContactError, ErrorBody};
use crate::limiter::{RateLimitResult, RateLimiter};
use crate::mail::MailTransport;
use crate::metrics::Metrics;
use crate::notifier::Notifier;
use crate::service::ContactService;
use crate::store::SubmissionStore;
use crate::submission::{ContactForm, Receipt};
use crate::validator::ContactValidator;
use axum::{
    body::{to_bytes, Body},
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

/// Shown to the submitter once their message is accepted.
pub const SUCCESS_MESSAGE: &str = "Thank you for your message! I will get back to you soon.";

/// Returned by the API-wide limiter.
pub const API_RATE_LIMITED_MESSAGE: &str = "Too many requests from this IP, please try again later.";

/// Shared application state.
pub struct AppState {
    pub contact: ContactService,
    pub api_limiter: RateLimiter,
    pub metrics: Metrics,
    pub config: Config,
}

impl AppState {
    /// Wire the pipeline from configuration and the two external collaborators.
    pub fn new(
        config: Config,
        store: Arc<dyn SubmissionStore>,
        transport: Arc<dyn MailTransport>,
    ) -> prometheus::Result<Self> {
        let metrics = Metrics::new()?;
        let contact = ContactService::new(
            Arc::new(RateLimiter::new(config.contact_rate_limit.clone())),
            ContactValidator::new(config.validation.clone()),
            store,
            Arc::new(Notifier::new(transport, &config.mail)),
            metrics.clone(),
        );

        Ok(Self {
            contact,
            api_limiter: RateLimiter::new(config.api_rate_limit.clone()),
            metrics,
            config,
        })
    }
}

/// Successful submission body.
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub success: bool,
    pub message: String,
    pub data: Receipt,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// `/api/health` response.
#[derive(Debug, Serialize)]
pub struct ApiHealthResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub timestamp: DateTime<Utc>,
    pub environment: String,
}

/// Build the full router.
pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/contact", post(submit_contact))
        .route("/health", get(api_health))
        .route_layer(middleware::from_fn_with_state(state.clone(), api_rate_limit));

    let mut app = Router::new()
        .nest("/api", api)
        .route("/health", get(health))
        .route("/healthz", get(health));

    if state.config.metrics.enabled {
        app = app.route(&state.config.metrics.path, get(metrics));
    }

    app.layer(cors_layer(&state.config.http))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(config: &HttpConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter(|o| o.as_str() != "*")
        .filter_map(|o| o.parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

/// Submit a contact message.
///
/// The body is only read once the rate gate has admitted the client, so a
/// limited client gets 429 without its upload being buffered or parsed.
pub async fn submit_contact(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    body: Body,
) -> Result<(StatusCode, Json<SubmitResponse>), ContactError> {
    let service = &state.contact;
    service.admit(addr.ip()).await?;

    let form = read_form(body, state.config.http.max_body_bytes)
        .await
        .map_err(|reason| {
            info!(ip = %addr.ip(), error = %reason, "Malformed contact body");
            service.reject(ContactError::MalformedBody(reason))
        })?;

    // Delivery continues on its own task after the response is sent.
    let accepted = service.accept(form)?;

    Ok((
        StatusCode::CREATED,
        Json(SubmitResponse {
            success: true,
            message: SUCCESS_MESSAGE.to_string(),
            data: accepted.receipt,
        }),
    ))
}

async fn read_form(body: Body, limit: usize) -> Result<ContactForm, String> {
    let bytes = to_bytes(body, limit)
        .await
        .map_err(|err| format!("Failed to read request body: {err}"))?;
    serde_json::from_slice(&bytes).map_err(|err| format!("Failed to parse request body: {err}"))
}

/// API-wide per-address limit.
pub async fn api_rate_limit(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    match state.api_limiter.check(addr.ip()).await {
        RateLimitResult::Allowed { remaining, .. } => {
            debug!(ip = %addr.ip(), remaining, path = %request.uri().path(), "API request allowed");
            next.run(request).await
        }
        RateLimitResult::Limited { retry_after } => {
            state.metrics.record_api_rate_limited();
            info!(ip = %addr.ip(), path = %request.uri().path(), "API request rate limited");
            let secs = retry_after_secs(retry_after);
            (
                StatusCode::TOO_MANY_REQUESTS,
                [(header::RETRY_AFTER, secs.to_string())],
                Json(ErrorBody::new(API_RATE_LIMITED_MESSAGE)),
            )
                .into_response()
        }
    }
}

/// Portfolio API health check.
pub async fn api_health(State(state): State<Arc<AppState>>) -> Json<ApiHealthResponse> {
    Json(ApiHealthResponse {
        status: "OK",
        message: "Portfolio API is running",
        timestamp: Utc::now(),
        environment: state.config.environment.clone(),
    })
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "portfolio-contact",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Prometheus text exposition.
pub async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    match state.metrics.render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(err) => {
            error!(error = %err, "Failed to render metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
