// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Prometheus counters for the contact pipeline.
//!
//! Downstream storage and mail failures never reach the submitter, so these
//! counters (and the warn logs) are how the owner notices them.

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

/// Contact pipeline metrics, registered on a private registry.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    submissions: IntCounterVec,
    storage_failures: IntCounter,
    notification_failures: IntCounterVec,
    api_rate_limited: IntCounter,
}

impl Metrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let submissions = IntCounterVec::new(
            Opts::new(
                "contact_submissions_total",
                "Contact submissions by outcome",
            ),
            &["outcome"],
        )?;
        let storage_failures = IntCounter::new(
            "contact_storage_failures_total",
            "Accepted submissions that could not be recorded",
        )?;
        let notification_failures = IntCounterVec::new(
            Opts::new(
                "contact_notification_failures_total",
                "Contact mails that failed or timed out",
            ),
            &["kind"],
        )?;
        let api_rate_limited = IntCounter::new(
            "api_rate_limited_total",
            "API requests rejected by the global rate limit",
        )?;

        registry.register(Box::new(submissions.clone()))?;
        registry.register(Box::new(storage_failures.clone()))?;
        registry.register(Box::new(notification_failures.clone()))?;
        registry.register(Box::new(api_rate_limited.clone()))?;

        Ok(Self {
            registry,
            submissions,
            storage_failures,
            notification_failures,
            api_rate_limited,
        })
    }

    /// `outcome` is `accepted` or a [`ContactError::kind`](crate::error::ContactError::kind).
    pub fn record_submission(&self, outcome: &str) {
        self.submissions.with_label_values(&[outcome]).inc();
    }

    pub fn record_storage_failure(&self) {
        self.storage_failures.inc();
    }

    pub fn record_notification_failure(&self, kind: &str) {
        self.notification_failures.with_label_values(&[kind]).inc();
    }

    pub fn record_api_rate_limited(&self) {
        self.api_rate_limited.inc();
    }

    pub fn submissions(&self, outcome: &str) -> u64 {
        self.submissions.with_label_values(&[outcome]).get()
    }

    pub fn storage_failures(&self) -> u64 {
        self.storage_failures.get()
    }

    pub fn notification_failures(&self, kind: &str) -> u64 {
        self.notification_failures.with_label_values(&[kind]).get()
    }

    /// Text exposition of every registered metric.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|err| prometheus::Error::Msg(err.to_string()))
    }
}
