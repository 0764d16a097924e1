// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Configuration for the contact service.
//!
//! Defaults mirror the behaviour of the portfolio backend: a loose 20 per
//! 15 minute contact policy, a 100 per 15 minute API-wide policy, a JSON
//! file backup of every submission and a 10 second mail timeout.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Longest accepted rate limit window (one week).
pub const MAX_WINDOW_MINUTES: u64 = 7 * 24 * 60;

/// Configuration for the contact service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server bind address (default: 0.0.0.0:5000)
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Deployment environment reported by `/api/health`
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Per-address limit on contact submissions
    #[serde(default)]
    pub contact_rate_limit: RateLimitConfig,

    /// Per-address limit on every `/api` route
    #[serde(default = "RateLimitConfig::api")]
    pub api_rate_limit: RateLimitConfig,

    /// Field rules for submissions
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Where submissions are recorded
    #[serde(default)]
    pub store: StoreConfig,

    /// Outbound mail settings
    #[serde(default)]
    pub mail: MailConfig,

    /// HTTP surface settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Metrics configuration
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Fixed-window rate limit policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Window length in minutes (default: 15)
    #[serde(default = "default_window_minutes")]
    pub window_minutes: u64,

    /// Requests allowed per address per window (default: 20)
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,
}

/// Named contact rate limit presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitPolicy {
    Loose,
    Strict,
}

impl FromStr for RateLimitPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "loose" => Ok(Self::Loose),
            "strict" => Ok(Self::Strict),
            other => Err(format!("unknown rate limit policy: {other}")),
        }
    }
}

/// Minimum trimmed lengths for the contact fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    #[serde(default = "default_name_min")]
    pub name_min_chars: usize,

    #[serde(default = "default_subject_min")]
    pub subject_min_chars: usize,

    #[serde(default = "default_message_min")]
    pub message_min_chars: usize,
}

/// Backing store selection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StoreConfig {
    /// JSON array on disk
    File {
        #[serde(default = "default_store_path")]
        path: PathBuf,
    },
    /// Process memory only; lost on restart
    Memory,
}

/// Outbound mail configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    /// Relay endpoint accepting JSON messages; mail is only logged when unset
    #[serde(default)]
    pub api_url: Option<String>,

    /// Bearer token for the relay
    #[serde(default, skip_serializing)]
    pub api_token: Option<String>,

    /// Sender address on both messages
    #[serde(default = "default_mail_from")]
    pub from: String,

    /// Recipient of owner notifications
    #[serde(default = "default_owner_email")]
    pub owner_email: String,

    /// Signature on acknowledgments
    #[serde(default = "default_owner_name")]
    pub owner_name: String,

    /// Upper bound on a single send in seconds (default: 10)
    #[serde(default = "default_mail_timeout_secs")]
    pub timeout_secs: u64,
}

/// HTTP surface configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// CORS allow-list
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,

    /// Maximum accepted request body (default: 10 MiB)
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable Prometheus metrics endpoint (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metrics endpoint path (default: /metrics)
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

// Default value functions
fn default_bind_addr() -> String {
    "0.0.0.0:5000".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_window_minutes() -> u64 {
    15
}

fn default_max_requests() -> u32 {
    20
}

fn default_name_min() -> usize {
    2
}

fn default_subject_min() -> usize {
    5
}

fn default_message_min() -> usize {
    10
}

fn default_store_path() -> PathBuf {
    PathBuf::from("contact-submissions.json")
}

fn default_mail_from() -> String {
    "no-reply@localhost".to_string()
}

fn default_owner_email() -> String {
    "owner@localhost".to_string()
}

fn default_owner_name() -> String {
    "Portfolio Owner".to_string()
}

fn default_mail_timeout_secs() -> u64 {
    10
}

fn default_allowed_origins() -> Vec<String> {
    vec![
        "http://localhost:5173".to_string(),
        "http://localhost:5174".to_string(),
        "http://localhost:5175".to_string(),
    ]
}

fn default_max_body_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_true() -> bool {
    true
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            environment: default_environment(),
            contact_rate_limit: RateLimitConfig::default(),
            api_rate_limit: RateLimitConfig::api(),
            validation: ValidationConfig::default(),
            store: StoreConfig::default(),
            mail: MailConfig::default(),
            http: HttpConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::loose()
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            name_min_chars: default_name_min(),
            subject_min_chars: default_subject_min(),
            message_min_chars: default_message_min(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::File {
            path: default_store_path(),
        }
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            api_token: None,
            from: default_mail_from(),
            owner_email: default_owner_email(),
            owner_name: default_owner_name(),
            timeout_secs: default_mail_timeout_secs(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            allowed_origins: default_allowed_origins(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            path: default_metrics_path(),
        }
    }
}

impl RateLimitConfig {
    /// 20 submissions per 15 minutes.
    pub fn loose() -> Self {
        Self {
            window_minutes: default_window_minutes(),
            max_requests: default_max_requests(),
        }
    }

    /// 3 submissions per 15 minutes.
    pub fn strict() -> Self {
        Self {
            window_minutes: 15,
            max_requests: 3,
        }
    }

    /// 100 requests per 15 minutes across the whole API.
    pub fn api() -> Self {
        Self {
            window_minutes: 15,
            max_requests: 100,
        }
    }

    pub fn from_policy(policy: RateLimitPolicy) -> Self {
        match policy {
            RateLimitPolicy::Loose => Self::loose(),
            RateLimitPolicy::Strict => Self::strict(),
        }
    }

    /// Get the rate window duration
    pub fn window_duration(&self) -> Duration {
        Duration::from_secs(self.window_minutes.saturating_mul(60))
    }

    /// Same policy with the window forced into `1..=MAX_WINDOW_MINUTES`.
    pub fn clamped(&self) -> Self {
        Self {
            window_minutes: self.window_minutes.clamp(1, MAX_WINDOW_MINUTES),
            max_requests: self.max_requests,
        }
    }
}

impl MailConfig {
    /// Get the per-send timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Load configuration from environment variables, reading `.env` first
    /// when present. Unset or unparsable values fall back to defaults.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let contact_policy = lookup("CONTACT_RATE_LIMIT_POLICY")
            .and_then(|v| v.parse::<RateLimitPolicy>().ok())
            .map(RateLimitConfig::from_policy)
            .unwrap_or_default();
        let contact_rate_limit = checked_limit(
            &lookup,
            "CONTACT_RATE_LIMIT_WINDOW",
            "CONTACT_RATE_LIMIT_MAX",
            contact_policy,
        );
        let api_rate_limit = checked_limit(
            &lookup,
            "RATE_LIMIT_WINDOW",
            "RATE_LIMIT_MAX",
            defaults.api_rate_limit.clone(),
        );

        let store = match lookup("CONTACT_STORE").as_deref().map(str::trim) {
            Some("memory") => StoreConfig::Memory,
            _ => StoreConfig::File {
                path: lookup("CONTACT_STORE_PATH")
                    .map(PathBuf::from)
                    .unwrap_or_else(default_store_path),
            },
        };

        let mail = MailConfig {
            api_url: lookup("MAIL_API_URL").filter(|v| !v.trim().is_empty()),
            api_token: lookup("MAIL_API_TOKEN").filter(|v| !v.trim().is_empty()),
            from: lookup("MAIL_FROM").unwrap_or(defaults.mail.from),
            owner_email: lookup("CONTACT_EMAIL").unwrap_or(defaults.mail.owner_email),
            owner_name: lookup("OWNER_NAME").unwrap_or(defaults.mail.owner_name),
            timeout_secs: parse_var(&lookup, "MAIL_TIMEOUT_SECS").unwrap_or(defaults.mail.timeout_secs),
        };

        let http = HttpConfig {
            allowed_origins: lookup("ALLOWED_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(|o| o.trim().to_string())
                        .filter(|o| !o.is_empty())
                        .filter(|o| {
                            // Credentialed CORS cannot use a wildcard origin.
                            if o == "*" {
                                warn!("Ignoring wildcard entry in ALLOWED_ORIGINS");
                            }
                            o != "*"
                        })
                        .collect()
                })
                .unwrap_or(defaults.http.allowed_origins),
            max_body_bytes: parse_var(&lookup, "MAX_BODY_BYTES").unwrap_or(defaults.http.max_body_bytes),
        };

        Self {
            bind_addr: lookup("BIND_ADDR").unwrap_or(defaults.bind_addr),
            environment: lookup("APP_ENV")
                .or_else(|| lookup("NODE_ENV"))
                .unwrap_or(defaults.environment),
            contact_rate_limit,
            api_rate_limit,
            validation: defaults.validation,
            store,
            mail,
            http,
            metrics: MetricsConfig {
                enabled: parse_var(&lookup, "METRICS_ENABLED").unwrap_or(defaults.metrics.enabled),
                path: defaults.metrics.path,
            },
        }
    }
}

/// Overlay window and max overrides on `base`, keeping `base`'s value for
/// anything out of range.
fn checked_limit<F>(lookup: &F, window_key: &str, max_key: &str, base: RateLimitConfig) -> RateLimitConfig
where
    F: Fn(&str) -> Option<String>,
{
    let mut limit = base;
    if let Some(window) = parse_var::<u64, _>(lookup, window_key) {
        if (1..=MAX_WINDOW_MINUTES).contains(&window) {
            limit.window_minutes = window;
        } else {
            warn!(
                key = window_key,
                value = window,
                max = MAX_WINDOW_MINUTES,
                default = limit.window_minutes,
                "Rate limit window out of range, using default"
            );
        }
    }
    if let Some(max) = parse_var::<u32, _>(lookup, max_key) {
        if max > 0 {
            limit.max_requests = max;
        } else {
            warn!(
                key = max_key,
                default = limit.max_requests,
                "Rate limit max must be positive, using default"
            );
        }
    }
    limit
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key).and_then(|v| v.trim().parse().ok())
}
