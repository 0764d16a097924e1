// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Portfolio Contact Service
//!
//! Accepts contact form submissions for the portfolio site, records them and
//! notifies the owner by e-mail.
//!
//! ## Configuration
//!
//! Configuration is loaded from environment variables (and `.env`):
//!
//! - `BIND_ADDR`: Server bind address (default: 0.0.0.0:5000)
//! - `CONTACT_RATE_LIMIT_POLICY`: `loose` (20 / 15 min, default) or `strict` (3 / 15 min)
//! - `CONTACT_RATE_LIMIT_WINDOW`, `CONTACT_RATE_LIMIT_MAX`: override the contact policy
//! - `RATE_LIMIT_WINDOW`, `RATE_LIMIT_MAX`: API-wide limit (default: 100 / 15 min)
//! - `CONTACT_STORE`: `file` (default) or `memory`; `CONTACT_STORE_PATH` for the file
//! - `MAIL_API_URL`, `MAIL_API_TOKEN`: mail relay; mail is only logged when unset
//! - `MAIL_FROM`, `CONTACT_EMAIL`, `OWNER_NAME`, `MAIL_TIMEOUT_SECS`
//! - `ALLOWED_ORIGINS`: comma separated CORS allow-list

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use portfolio_contact::{
    config::Config, handlers::router, mail, shutdown::shutdown_signal, store, AppState,
};

/// How long shutdown waits for in-flight deliveries.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    // Load configuration
    let config = Config::from_env();
    info!(
        bind_addr = %config.bind_addr,
        environment = %config.environment,
        contact_max = config.contact_rate_limit.max_requests,
        contact_window_minutes = config.contact_rate_limit.window_minutes,
        api_max = config.api_rate_limit.max_requests,
        mail_timeout_secs = config.mail.timeout_secs,
        "Starting portfolio contact service"
    );

    // Create application state
    let store = store::from_config(&config.store);
    let transport = mail::from_config(&config.mail);
    let state = Arc::new(AppState::new(config.clone(), store, transport)?);

    // Spawn cleanup task
    let cleanup_state = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            cleanup_state.contact.limiter().cleanup().await;
            cleanup_state.api_limiter.cleanup().await;
        }
    });

    // Build router
    let app = router(state.clone());

    // Start server
    let addr: SocketAddr = config.bind_addr.parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "Server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    let deliveries = state.contact.deliveries();
    if deliveries.in_flight() > 0 {
        info!(in_flight = deliveries.in_flight(), "Waiting for contact deliveries");
    }
    if !deliveries.drain(DRAIN_TIMEOUT).await {
        warn!(
            in_flight = deliveries.in_flight(),
            "Shutting down with contact deliveries still running"
        );
    }

    Ok(())
}
