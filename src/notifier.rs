// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Best-effort e-mail notification for accepted submissions.
//!
//! Two messages go out per submission: one to the site owner and one
//! acknowledging receipt to the submitter. Both are attempted once,
//! concurrently, each under its own timeout. Failures are logged and
//! reported back but never retried.

use crate::config::MailConfig;
use crate::error::NotificationError;
use crate::mail::{MailTransport, OutboundMessage, SendReceipt};
use crate::submission::Submission;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Subject prefix on owner notifications.
pub const OWNER_SUBJECT_PREFIX: &str = "Portfolio Contact: ";

/// Subject of the acknowledgment sent to the submitter.
pub const ACK_SUBJECT: &str = "Thank you for contacting me!";

/// Which of the two messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Owner,
    Acknowledgment,
}

impl MessageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::Owner => "owner",
            MessageKind::Acknowledgment => "acknowledgment",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of both sends for one submission.
#[derive(Debug)]
pub struct NotifyReport {
    pub owner: Result<SendReceipt, NotificationError>,
    pub acknowledgment: Result<SendReceipt, NotificationError>,
}

impl NotifyReport {
    pub fn failures(&self) -> impl Iterator<Item = (MessageKind, &NotificationError)> + '_ {
        [
            (MessageKind::Owner, self.owner.as_ref().err()),
            (MessageKind::Acknowledgment, self.acknowledgment.as_ref().err()),
        ]
        .into_iter()
        .filter_map(|(kind, err)| err.map(|err| (kind, err)))
    }

    pub fn all_sent(&self) -> bool {
        self.owner.is_ok() && self.acknowledgment.is_ok()
    }
}

/// Composes and sends the two contact messages.
pub struct Notifier {
    transport: Arc<dyn MailTransport>,
    from: String,
    owner_email: String,
    owner_name: String,
    timeout: Duration,
}

impl Notifier {
    pub fn new(transport: Arc<dyn MailTransport>, config: &MailConfig) -> Self {
        Self {
            transport,
            from: config.from.clone(),
            owner_email: config.owner_email.clone(),
            owner_name: config.owner_name.clone(),
            timeout: config.timeout(),
        }
    }

    /// Attempt both messages. Never fails as a whole; per-message results are
    /// in the report.
    pub async fn notify(&self, submission: &Submission) -> NotifyReport {
        let owner_message = self.owner_message(submission);
        let ack_message = self.acknowledgment_message(submission);

        let (owner, acknowledgment) = tokio::join!(
            self.send(MessageKind::Owner, submission, &owner_message),
            self.send(MessageKind::Acknowledgment, submission, &ack_message),
        );

        NotifyReport {
            owner,
            acknowledgment,
        }
    }

    async fn send(
        &self,
        kind: MessageKind,
        submission: &Submission,
        message: &OutboundMessage,
    ) -> Result<SendReceipt, NotificationError> {
        let result = match tokio::time::timeout(self.timeout, self.transport.send(message)).await {
            Ok(result) => result,
            Err(_) => Err(NotificationError::Timeout(self.timeout)),
        };

        match &result {
            Ok(receipt) => debug!(
                id = %submission.id(),
                kind = %kind,
                message_id = ?receipt.message_id,
                "Contact mail sent"
            ),
            Err(err) => warn!(
                id = %submission.id(),
                kind = %kind,
                error = %err,
                "Contact mail failed"
            ),
        }
        result
    }

    /// Notification to the site owner with every field of the submission.
    pub fn owner_message(&self, submission: &Submission) -> OutboundMessage {
        let received = submission.submitted_at().to_rfc3339();
        let html = format!(
            concat!(
                "<h3>New Contact Form Submission</h3>\n",
                "<p><strong>Name:</strong> {name}</p>\n",
                "<p><strong>Email:</strong> {email}</p>\n",
                "<p><strong>Subject:</strong> {subject}</p>\n",
                "<p><strong>Message:</strong></p>\n",
                "<p>{message}</p>\n",
                "<p><strong>Received:</strong> {received}</p>\n",
            ),
            name = escape_html(submission.name()),
            email = escape_html(submission.email()),
            subject = escape_html(submission.subject()),
            message = escape_html(submission.message()).replace('\n', "<br>"),
            received = received,
        );
        let text = format!(
            "New Contact Form Submission\n\nName: {}\nEmail: {}\nSubject: {}\nMessage: {}\nReceived: {}\n",
            submission.name(),
            submission.email(),
            submission.subject(),
            submission.message(),
            received,
        );

        OutboundMessage {
            from: self.from.clone(),
            to: self.owner_email.clone(),
            reply_to: Some(submission.email().to_string()),
            subject: format!("{OWNER_SUBJECT_PREFIX}{}", submission.subject()),
            html,
            text,
        }
    }

    /// Acknowledgment to the submitter restating what they sent.
    pub fn acknowledgment_message(&self, submission: &Submission) -> OutboundMessage {
        let html = format!(
            concat!(
                "<h2>Thank you for your message!</h2>\n",
                "<p>Hi {name},</p>\n",
                "<p>I've received your message about \"{subject}\" and will get back to you as soon as possible.</p>\n",
                "<p>Best regards,<br>{owner}</p>\n",
                "<hr>\n",
                "<h4>Your message:</h4>\n",
                "<p>{message}</p>\n",
            ),
            name = escape_html(submission.name()),
            subject = escape_html(submission.subject()),
            owner = escape_html(&self.owner_name),
            message = escape_html(submission.message()).replace('\n', "<br>"),
        );
        let text = format!(
            "Hi {},\n\nI've received your message about \"{}\" and will get back to you as soon as possible.\n\nBest regards,\n{}\n\nYour message:\n{}\n",
            submission.name(),
            submission.subject(),
            self.owner_name,
            submission.message(),
        );

        OutboundMessage {
            from: self.from.clone(),
            to: submission.email().to_string(),
            reply_to: Some(self.owner_email.clone()),
            subject: ACK_SUBJECT.to_string(),
            html,
            text,
        }
    }
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
