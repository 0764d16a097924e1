// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Contact submission types.
//!
//! A [`ContactForm`] is whatever the client sent. A [`Submission`] only
//! exists once a form has passed validation and been stamped with an id and
//! receipt time; its fields cannot be changed afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Raw contact form body. Missing fields deserialize as empty strings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ContactForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub message: String,
}

/// Identifier assigned at receipt time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubmissionId(u64);

impl SubmissionId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hands out time-derived ids that never repeat within a process.
///
/// Ids are epoch milliseconds; two receipts in the same millisecond get
/// consecutive values.
#[derive(Debug, Default)]
pub struct IdGenerator {
    last: AtomicU64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self, at: DateTime<Utc>) -> SubmissionId {
        let candidate = u64::try_from(at.timestamp_millis()).unwrap_or(0);
        let mut current = self.last.load(Ordering::Relaxed);
        loop {
            let next = candidate.max(current + 1);
            match self
                .last
                .compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return SubmissionId(next),
                Err(observed) => current = observed,
            }
        }
    }
}

/// A validated contact submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    id: SubmissionId,
    name: String,
    email: String,
    subject: String,
    message: String,
    submitted_at: DateTime<Utc>,
}

impl Submission {
    /// Stamp an already validated form. Only the contact service calls this,
    /// after the validator has accepted `form`.
    pub(crate) fn accept(form: ContactForm, id: SubmissionId, submitted_at: DateTime<Utc>) -> Self {
        Self {
            id,
            name: form.name,
            email: form.email,
            subject: form.subject,
            message: form.message,
            submitted_at,
        }
    }

    pub fn id(&self) -> SubmissionId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }
}

/// What the caller is told once a submission has been accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Receipt {
    pub id: SubmissionId,
    pub timestamp: DateTime<Utc>,
}

impl From<&Submission> for Receipt {
    fn from(submission: &Submission) -> Self {
        Self {
            id: submission.id(),
            timestamp: submission.submitted_at(),
        }
    }
}

#[cfg(test)]
pub(crate) fn sample_submission(id: u64) -> Submission {
    use chrono::TimeZone;

    Submission::accept(
        ContactForm {
            name: "Jo".to_string(),
            email: "jo@x.com".to_string(),
            subject: "Hello there".to_string(),
            message: "This is a test message".to_string(),
        },
        SubmissionId(id),
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 30, 0).unwrap(),
    )
}
