// SPDX-License-Identifier: Apache-2.0
//! Error types for the contact service.
//!
//! Only [`ContactError`] is ever shown to a caller. Storage and notification
//! failures happen after the caller has been told the submission succeeded;
//! they are logged and counted, never returned.

use crate::validator::ValidationErrors;
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Message returned when the contact limiter rejects a request.
pub const RATE_LIMITED_MESSAGE: &str =
    "Too many contact attempts from this IP, please try again later.";

/// Rejections that end a contact request before anything is recorded.
#[derive(Debug, Error)]
pub enum ContactError {
    #[error("Too many contact attempts from this IP, please try again later.")]
    RateLimited { retry_after: Duration },

    #[error("{0}")]
    Validation(ValidationErrors),

    #[error("Malformed request body: {0}")]
    MalformedBody(String),
}

/// Failure of the durable store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Stored submissions are unreadable: {0}")]
    Corrupt(String),

    #[error("Failed to serialize submissions: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Failure of a single outbound message.
#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Mail transport error: {0}")]
    Transport(String),

    #[error("Mail relay rejected message with status {status}")]
    Rejected { status: u16 },

    #[error("Mail send timed out after {0:?}")]
    Timeout(Duration),
}

impl From<reqwest::Error> for NotificationError {
    fn from(err: reqwest::Error) -> Self {
        NotificationError::Transport(err.to_string())
    }
}

/// Failure envelope shared by every rejection.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<ValidationErrors>,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            errors: None,
        }
    }
}

impl ContactError {
    pub fn status(&self) -> StatusCode {
        match self {
            ContactError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ContactError::Validation(_) | ContactError::MalformedBody(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Stable label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ContactError::RateLimited { .. } => "rate_limited",
            ContactError::Validation(_) => "invalid",
            ContactError::MalformedBody(_) => "malformed",
        }
    }
}

impl IntoResponse for ContactError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            ContactError::RateLimited { retry_after } => {
                let mut response = (status, Json(ErrorBody::new(RATE_LIMITED_MESSAGE))).into_response();
                response.headers_mut().insert(
                    header::RETRY_AFTER,
                    HeaderValue::from(retry_after_secs(retry_after)),
                );
                response
            }
            ContactError::Validation(errors) => {
                let error = errors
                    .first()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| "Invalid contact form".to_string());
                let body = ErrorBody {
                    success: false,
                    error,
                    errors: Some(errors),
                };
                (status, Json(body)).into_response()
            }
            ContactError::MalformedBody(_) => {
                (status, Json(ErrorBody::new("Malformed request body"))).into_response()
            }
        }
    }
}

/// Whole seconds, rounded up so clients never retry early.
pub fn retry_after_secs(retry_after: Duration) -> u64 {
    let secs = retry_after.as_secs();
    if retry_after.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, ContactError>;
