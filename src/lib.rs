// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Portfolio Contact
//!
//! This crate provides the contact form backend for the portfolio site:
//!
//! - Per-address rate limiting over a fixed window (loose 20 / 15 min by
//!   default, strict 3 / 15 min available)
//! - Field validation reporting every violation at once
//! - Append-only JSON record of accepted submissions
//! - Best-effort owner notification and submitter acknowledgment by e-mail
//!
//! Once a submission passes the rate and validation gates the caller is told
//! it succeeded; storage and mail failures are only logged and counted.

pub mod config;
pub mod error;
pub mod handlers;
pub mod limiter;
pub mod mail;
pub mod metrics;
pub mod notifier;
pub mod service;
pub mod shutdown;
pub mod store;
pub mod submission;
pub mod validator;

pub use config::Config;
pub use error::{ContactError, NotificationError, StorageError};
pub use handlers::{router, AppState};
pub use limiter::{RateLimitResult, RateLimiter};
pub use mail::{MailTransport, OutboundMessage, SendReceipt};
pub use service::{Accepted, ContactService, DeliveryReport};
pub use store::{JsonFileStore, MemoryStore, SubmissionStore};
pub use submission::{ContactForm, Receipt, Submission, SubmissionId};
pub use validator::{ContactValidator, ValidationErrors};
