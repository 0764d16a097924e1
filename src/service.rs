// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Contact submission pipeline.
//!
//! A request moves through
//! `RECEIVED -> RATE_CHECKED -> VALIDATED -> PERSISTED -> NOTIFIED -> RESPONDED`.
//! Only the first two gates can reject. Once a form is valid the caller gets
//! a receipt straight away, and recording plus mailing run on a detached
//! task that finishes even if the client has gone.

use crate::error::{ContactError, StorageError};
use crate::limiter::{RateLimitResult, RateLimiter};
use crate::metrics::Metrics;
use crate::notifier::{Notifier, NotifyReport};
use crate::store::SubmissionStore;
use crate::submission::{ContactForm, IdGenerator, Receipt, Submission};
use crate::validator::ContactValidator;
use chrono::Utc;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// What happened downstream of an accepted submission.
#[derive(Debug)]
pub struct DeliveryReport {
    pub submission: Submission,
    pub stored: Result<(), StorageError>,
    pub notified: NotifyReport,
}

/// An accepted submission. `delivery` may be dropped; the task keeps running.
#[derive(Debug)]
pub struct Accepted {
    pub receipt: Receipt,
    pub delivery: JoinHandle<DeliveryReport>,
}

/// Counts delivery tasks that have not finished yet.
#[derive(Debug, Default)]
pub struct DeliveryTracker {
    in_flight: AtomicUsize,
    idle: Notify,
}

struct DeliveryGuard(Arc<DeliveryTracker>);

impl Drop for DeliveryGuard {
    fn drop(&mut self) {
        if self.0.in_flight.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

impl DeliveryTracker {
    fn begin(self: &Arc<Self>) -> DeliveryGuard {
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        DeliveryGuard(self.clone())
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Resolve once no delivery task is running.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Like [`wait_idle`](Self::wait_idle) but gives up after `limit`.
    /// Returns whether everything finished.
    pub async fn drain(&self, limit: Duration) -> bool {
        tokio::time::timeout(limit, self.wait_idle()).await.is_ok()
    }
}

/// Orchestrates the contact pipeline. Built once at startup.
pub struct ContactService {
    limiter: Arc<RateLimiter>,
    validator: ContactValidator,
    store: Arc<dyn SubmissionStore>,
    notifier: Arc<Notifier>,
    ids: IdGenerator,
    metrics: Metrics,
    deliveries: Arc<DeliveryTracker>,
}

impl ContactService {
    pub fn new(
        limiter: Arc<RateLimiter>,
        validator: ContactValidator,
        store: Arc<dyn SubmissionStore>,
        notifier: Arc<Notifier>,
        metrics: Metrics,
    ) -> Self {
        Self {
            limiter,
            validator,
            store,
            notifier,
            ids: IdGenerator::new(),
            metrics,
            deliveries: Arc::new(DeliveryTracker::default()),
        }
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn store(&self) -> &Arc<dyn SubmissionStore> {
        &self.store
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn deliveries(&self) -> &Arc<DeliveryTracker> {
        &self.deliveries
    }

    /// Rate gate. Counts this request against `ip`.
    pub async fn admit(&self, ip: IpAddr) -> Result<(), ContactError> {
        match self.limiter.check(ip).await {
            RateLimitResult::Allowed { remaining, .. } => {
                debug!(%ip, remaining, "Contact request admitted");
                Ok(())
            }
            RateLimitResult::Limited { retry_after } => {
                info!(
                    %ip,
                    retry_after_secs = retry_after.as_secs(),
                    "Contact request rate limited"
                );
                Err(self.reject(ContactError::RateLimited { retry_after }))
            }
        }
    }

    /// Validation gate, then hand-off. Must only be called after [`admit`](Self::admit).
    pub fn accept(&self, form: ContactForm) -> Result<Accepted, ContactError> {
        if let Err(errors) = self.validator.validate(&form) {
            info!(error = %errors, "Contact form invalid");
            return Err(self.reject(ContactError::Validation(errors)));
        }

        let submitted_at = Utc::now();
        let submission = Submission::accept(form, self.ids.next_id(submitted_at), submitted_at);
        let receipt = Receipt::from(&submission);
        self.metrics.record_submission("accepted");
        info!(id = %receipt.id, "Contact submission accepted");

        let delivery = self.spawn_delivery(submission);
        Ok(Accepted { receipt, delivery })
    }

    /// Both gates in order.
    pub async fn submit(&self, ip: IpAddr, form: ContactForm) -> Result<Accepted, ContactError> {
        self.admit(ip).await?;
        self.accept(form)
    }

    /// Record a rejection that happened outside the service, e.g. an
    /// unparsable body.
    pub fn reject(&self, err: ContactError) -> ContactError {
        self.metrics.record_submission(err.kind());
        err
    }

    fn spawn_delivery(&self, submission: Submission) -> JoinHandle<DeliveryReport> {
        let store = self.store.clone();
        let notifier = self.notifier.clone();
        let metrics = self.metrics.clone();
        let guard = self.deliveries.begin();

        tokio::spawn(async move {
            let _guard = guard;

            let stored = store.append(&submission).await;
            if let Err(err) = &stored {
                metrics.record_storage_failure();
                warn!(id = %submission.id(), error = %err, "Failed to record contact submission");
            }

            let notified = notifier.notify(&submission).await;
            for (kind, _) in notified.failures() {
                metrics.record_notification_failure(kind.as_str());
            }

            debug!(
                id = %submission.id(),
                stored = stored.is_ok(),
                notified = notified.all_sent(),
                "Contact delivery finished"
            );

            DeliveryReport {
                submission,
                stored,
                notified,
            }
        })
    }
}
