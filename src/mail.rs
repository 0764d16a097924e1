// SPDX-License-Identifier: PMPL-1.0-or-later
// Outbound mail transport.
//
// Messages are handed to a transactional mail relay over HTTP. When no relay
// is configured the service falls back to logging what would have been sent.

use crate::config::MailConfig;
use crate::error::NotificationError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// One outbound e-mail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundMessage {
    pub from: String,
    pub to: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// Confirmation returned by a transport.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SendReceipt {
    #[serde(default, alias = "messageId", alias = "MessageID")]
    pub message_id: Option<String>,
}

/// Something that can deliver an [`OutboundMessage`].
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, message: &OutboundMessage) -> Result<SendReceipt, NotificationError>;
}

/// Build the configured transport.
pub fn from_config(config: &MailConfig) -> Arc<dyn MailTransport> {
    match &config.api_url {
        Some(url) => {
            info!(relay = %url, "Mail notifications enabled");
            Arc::new(HttpMailTransport::new(
                url.clone(),
                config.api_token.clone(),
                config.timeout(),
            ))
        }
        None => {
            warn!("MAIL_API_URL not set, contact notifications will only be logged");
            Arc::new(LogTransport)
        }
    }
}

/// Mail relay client
pub struct HttpMailTransport {
    endpoint: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl HttpMailTransport {
    /// Create a relay client whose requests give up after `timeout`.
    pub fn new(endpoint: String, token: Option<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|err| {
                warn!(error = %err, "Falling back to default HTTP client for mail relay");
                reqwest::Client::new()
            });
        Self {
            endpoint,
            token,
            client,
        }
    }
}

#[async_trait]
impl MailTransport for HttpMailTransport {
    async fn send(&self, message: &OutboundMessage) -> Result<SendReceipt, NotificationError> {
        let mut request = self.client.post(&self.endpoint).json(message);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(NotificationError::Rejected {
                status: status.as_u16(),
            });
        }

        // Relays differ in what they return; a missing or odd body is still a send.
        Ok(response.json::<SendReceipt>().await.unwrap_or_default())
    }
}

/// Logs messages instead of sending them.
#[derive(Debug, Default)]
pub struct LogTransport;

#[async_trait]
impl MailTransport for LogTransport {
    async fn send(&self, message: &OutboundMessage) -> Result<SendReceipt, NotificationError> {
        info!(
            to = %message.to,
            subject = %message.subject,
            body = %message.text,
            "Mail relay disabled, message not sent"
        );
        Ok(SendReceipt::default())
    }
}
