//! Server Configuration
//!
//! Loads configuration from environment variables.

use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

/// Default delay table between delivery attempts, in seconds.
///
/// Indexed by the number of attempts already made (1-based); attempts past
/// the end of the table reuse the last entry.
pub const DEFAULT_RETRY_DELAYS_SECS: [u64; 5] = [1, 5, 15, 60, 300];

/// Maximum attempts before a delivery becomes terminally failed.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (e.g., "0.0.0.0:8080")
    pub bind_address: String,

    /// Webhook delivery settings
    pub webhook: WebhookConfig,
}

/// Delivery engine settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookConfig {
    /// Per-attempt HTTP timeout (default: 30s)
    pub request_timeout: Duration,

    /// `User-Agent` header sent with every delivery
    pub user_agent: String,

    /// Attempt ceiling per delivery (default: 5)
    pub max_attempts: u32,

    /// Delay before the next attempt, indexed by attempts made so far
    pub retry_delays: Vec<Duration>,

    /// Deliveries older than this are purged by the cleanup task (default: 30)
    pub retention_days: u32,

    /// How often the cleanup task runs (default: 24h)
    pub cleanup_interval: Duration,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            user_agent: "Portfolio-Webhook/1.0".into(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delays: DEFAULT_RETRY_DELAYS_SECS
                .iter()
                .copied()
                .map(Duration::from_secs)
                .collect(),
            retention_days: 30,
            cleanup_interval: Duration::from_secs(86_400),
        }
    }
}

impl WebhookConfig {
    /// Load overrides from environment variables on top of the defaults.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            request_timeout: parse_var("WEBHOOK_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            user_agent: env::var("WEBHOOK_USER_AGENT").unwrap_or(defaults.user_agent),
            retention_days: parse_var("WEBHOOK_RETENTION_DAYS")?.unwrap_or(defaults.retention_days),
            cleanup_interval: parse_var("WEBHOOK_CLEANUP_INTERVAL_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.cleanup_interval),
            ..defaults
        })
    }

    /// Delay to wait after `attempts` failed attempts.
    ///
    /// `attempts` is 1-based; values past the table reuse the last entry.
    #[must_use]
    pub fn retry_delay(&self, attempts: u32) -> Duration {
        let index = (attempts.max(1) as usize - 1).min(self.retry_delays.len().saturating_sub(1));
        self.retry_delays
            .get(index)
            .copied()
            .unwrap_or(Duration::from_secs(DEFAULT_RETRY_DELAYS_SECS[4]))
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            webhook: WebhookConfig::from_env()?,
        })
    }

    /// Create a default configuration for testing.
    #[must_use]
    pub fn default_for_test() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".into(),
            webhook: WebhookConfig::default(),
        }
    }
}

/// Parse an optional numeric environment variable, failing loudly on garbage.
fn parse_var<T>(name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("{name} must be a number, got {raw:?}")),
        Err(_) => Ok(None),
    }
}
