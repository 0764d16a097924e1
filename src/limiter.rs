// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Fixed-window rate limiter keyed by client address.
//!
//! The first request from an address opens a window of `window_minutes`.
//! Up to `max_requests` requests are admitted inside it; the window is
//! replaced by a fresh one on the first request at or after
//! `opened + window`. All counters sit behind one async mutex so that
//! concurrent requests from the same address are never lost.

use crate::config::RateLimitConfig;
use std::collections::HashMap;
use std::net::IpAddr;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Result of a rate limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitResult {
    /// Request is allowed
    Allowed {
        /// Remaining requests in current window
        remaining: u32,
        /// Time until window resets
        reset_in: Duration,
    },
    /// Request is rate limited
    Limited {
        /// Time until the current window closes
        retry_after: Duration,
    },
}

impl RateLimitResult {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitResult::Allowed { .. })
    }
}

/// One address's current window.
#[derive(Debug)]
struct Window {
    opened: Instant,
    count: u32,
}

impl Window {
    fn open(now: Instant) -> Self {
        Self {
            opened: now,
            count: 0,
        }
    }

    /// `None` when the close time is past what `Instant` can represent.
    fn closes_at(&self, length: Duration) -> Option<Instant> {
        self.opened.checked_add(length)
    }

    fn is_closed(&self, now: Instant, length: Duration) -> bool {
        self.closes_at(length).is_some_and(|at| now >= at)
    }
}

/// Thread-safe rate limiter.
#[derive(Debug)]
pub struct RateLimiter {
    /// Configuration
    config: RateLimitConfig,
    /// Per-address windows
    windows: Mutex<HashMap<IpAddr, Window>>,
}

impl RateLimiter {
    /// Create a new rate limiter with the given configuration. The window is
    /// clamped to `1..=MAX_WINDOW_MINUTES`.
    pub fn new(config: RateLimitConfig) -> Self {
        let clamped = config.clamped();
        if clamped != config {
            warn!(
                window_minutes = config.window_minutes,
                clamped_to = clamped.window_minutes,
                "Rate limit window out of range"
            );
        }
        Self {
            config: clamped,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Count one request from `ip` and report whether it may proceed.
    pub async fn check(&self, ip: IpAddr) -> RateLimitResult {
        let now = Instant::now();
        let length = self.config.window_duration();

        let mut windows = self.windows.lock().await;
        let window = windows.entry(ip).or_insert_with(|| Window::open(now));

        if window.is_closed(now, length) {
            *window = Window::open(now);
        }

        let reset_in = window
            .closes_at(length)
            .map_or(length, |at| at.saturating_duration_since(now));

        if window.count < self.config.max_requests {
            window.count += 1;
            RateLimitResult::Allowed {
                remaining: self.config.max_requests - window.count,
                reset_in,
            }
        } else {
            debug!(%ip, ?reset_in, "Rate limit exceeded");
            RateLimitResult::Limited {
                retry_after: reset_in,
            }
        }
    }

    /// Number of addresses currently tracked.
    pub async fn tracked(&self) -> usize {
        self.windows.lock().await.len()
    }

    /// Drop windows that have already closed (should be called periodically).
    pub async fn cleanup(&self) {
        let now = Instant::now();
        let length = self.config.window_duration();

        let mut windows = self.windows.lock().await;
        let before = windows.len();
        windows.retain(|_, window| !window.is_closed(now, length));
        let removed = before - windows.len();
        if removed > 0 {
            debug!(removed, remaining = windows.len(), "Expired rate limit windows removed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use std::sync::Arc;

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(127, 0, 0, last))
    }

    #[tokio::test(start_paused = true)]
    async fn test_admits_exactly_max_requests() {
        let limiter = RateLimiter::new(RateLimitConfig {
            window_minutes: 15,
            max_requests: 5,
        });

        for i in 0..5 {
            match limiter.check(ip(1)).await {
                RateLimitResult::Allowed { remaining, .. } => assert_eq!(remaining, 4 - i),
                RateLimitResult::Limited { .. } => panic!("Should not be limited"),
            }
        }

        match limiter.check(ip(1)).await {
            RateLimitResult::Limited { retry_after } => {
                assert_eq!(retry_after, Duration::from_secs(900));
            }
            RateLimitResult::Allowed { .. } => panic!("Should be limited"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_resets_exactly_at_boundary() {
        let limiter = RateLimiter::new(RateLimitConfig::strict());
        for _ in 0..3 {
            assert!(limiter.check(ip(1)).await.is_allowed());
        }

        tokio::time::advance(Duration::from_secs(900) - Duration::from_millis(1)).await;
        match limiter.check(ip(1)).await {
            RateLimitResult::Limited { retry_after } => {
                assert_eq!(retry_after, Duration::from_millis(1));
            }
            RateLimitResult::Allowed { .. } => panic!("Window must not reset early"),
        }

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(limiter.check(ip(1)).await.is_allowed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_limited_requests_do_not_extend_window() {
        let limiter = RateLimiter::new(RateLimitConfig {
            window_minutes: 1,
            max_requests: 1,
        });
        assert!(limiter.check(ip(1)).await.is_allowed());
        for _ in 0..10 {
            tokio::time::advance(Duration::from_secs(5)).await;
            assert!(!limiter.check(ip(1)).await.is_allowed());
        }
        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(limiter.check(ip(1)).await.is_allowed());
    }

    #[tokio::test]
    async fn test_addresses_are_independent() {
        let limiter = RateLimiter::new(RateLimitConfig {
            window_minutes: 15,
            max_requests: 1,
        });
        assert!(limiter.check(ip(1)).await.is_allowed());
        assert!(!limiter.check(ip(1)).await.is_allowed());
        assert!(limiter.check(ip(2)).await.is_allowed());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_requests_are_all_counted() {
        let limiter = Arc::new(RateLimiter::new(RateLimitConfig {
            window_minutes: 15,
            max_requests: 50,
        }));

        let handles: Vec<_> = (0..80)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move { limiter.check(ip(9)).await.is_allowed() })
            })
            .collect();

        let mut allowed = 0;
        for handle in handles {
            if handle.await.unwrap() {
                allowed += 1;
            }
        }
        assert_eq!(allowed, 50);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_removes_closed_windows() {
        let limiter = RateLimiter::new(RateLimitConfig::loose());
        limiter.check(ip(1)).await;
        tokio::time::advance(Duration::from_secs(600)).await;
        limiter.check(ip(2)).await;

        tokio::time::advance(Duration::from_secs(300)).await;
        limiter.cleanup().await;
        assert_eq!(limiter.tracked().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_window_still_limits() {
        let limiter = RateLimiter::new(RateLimitConfig {
            window_minutes: 0,
            max_requests: 3,
        });
        assert_eq!(limiter.config().window_minutes, 1);

        let mut allowed = 0;
        for _ in 0..50 {
            if limiter.check(ip(1)).await.is_allowed() {
                allowed += 1;
            }
        }
        assert_eq!(allowed, 3);

        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(limiter.check(ip(1)).await.is_allowed());
    }

    #[tokio::test]
    async fn test_huge_window_does_not_panic() {
        let limiter = RateLimiter::new(RateLimitConfig {
            window_minutes: 200_000_000_000_000_000,
            max_requests: 1,
        });
        assert!(limiter.check(ip(1)).await.is_allowed());
        match limiter.check(ip(1)).await {
            RateLimitResult::Limited { retry_after } => {
                assert!(retry_after <= limiter.config().window_duration());
            }
            RateLimitResult::Allowed { .. } => panic!("Should be limited"),
        }
        limiter.cleanup().await;
        assert_eq!(limiter.tracked().await, 1);
    }

    #[test]
    fn test_unrepresentable_close_time_never_closes() {
        let window = Window::open(Instant::now());
        assert!(window.closes_at(Duration::MAX).is_none());
        assert!(!window.is_closed(Instant::now(), Duration::MAX));
    }
}
