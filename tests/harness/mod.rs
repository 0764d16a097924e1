// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Test doubles for the contact pipeline's external collaborators.

#![allow(dead_code)]

use async_trait::async_trait;
use portfolio_contact::{
    config::{MailConfig, RateLimitConfig, ValidationConfig},
    metrics::Metrics,
    notifier::Notifier,
    ContactForm, ContactService, ContactValidator, MailTransport, NotificationError,
    OutboundMessage, RateLimiter, SendReceipt, StorageError, Submission, SubmissionStore,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Records every message; optionally fails every send.
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<OutboundMessage>>,
    fail: bool,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Default::default()
        })
    }

    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MailTransport for RecordingTransport {
    async fn send(&self, message: &OutboundMessage) -> Result<SendReceipt, NotificationError> {
        self.sent.lock().unwrap().push(message.clone());
        if self.fail {
            return Err(NotificationError::Transport("connection refused".to_string()));
        }
        Ok(SendReceipt {
            message_id: Some(format!("msg-{}", self.sent.lock().unwrap().len())),
        })
    }
}

/// Store whose appends always fail.
#[derive(Default)]
pub struct FailingStore {
    attempts: AtomicUsize,
}

impl FailingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SubmissionStore for FailingStore {
    async fn append(&self, _submission: &Submission) -> Result<(), StorageError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(StorageError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "read-only filesystem",
        )))
    }

    async fn load_all(&self) -> Result<Vec<Submission>, StorageError> {
        Ok(Vec::new())
    }
}

pub fn mail_config() -> MailConfig {
    MailConfig {
        from: "site@example.com".to_string(),
        owner_email: "owner@example.com".to_string(),
        owner_name: "Site Owner".to_string(),
        ..Default::default()
    }
}

pub fn service(
    rate_limit: RateLimitConfig,
    store: Arc<dyn SubmissionStore>,
    transport: Arc<dyn MailTransport>,
) -> ContactService {
    ContactService::new(
        Arc::new(RateLimiter::new(rate_limit)),
        ContactValidator::new(ValidationConfig::default()),
        store,
        Arc::new(Notifier::new(transport, &mail_config())),
        Metrics::new().unwrap(),
    )
}

pub fn form(name: &str, email: &str, subject: &str, message: &str) -> ContactForm {
    ContactForm {
        name: name.to_string(),
        email: email.to_string(),
        subject: subject.to_string(),
        message: message.to_string(),
    }
}

pub fn valid_form() -> ContactForm {
    form("Jo", "jo@x.com", "Hello there", "This is a test message")
}
