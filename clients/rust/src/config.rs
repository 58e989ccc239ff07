//! Configuration types for the LedgerGateway.
//!
//! This module provides configuration structs for endpoint health, retries,
//! rate limiting, confirmation polling, and the main gateway configuration.

use std::time::Duration;

use solana_sdk::pubkey::Pubkey;

/// Last-resort endpoint used after every configured endpoint is exhausted.
pub const DEFAULT_FALLBACK_URL: &str = "https://api.mainnet-beta.solana.com";

/// USDC mint on mainnet.
pub const USDC_MINT: Pubkey = Pubkey::from_str_const("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v");

/// USDT mint on mainnet.
pub const USDT_MINT: Pubkey = Pubkey::from_str_const("Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB");

/// Endpoint health configuration.
#[derive(Debug, Clone)]
pub struct HealthConfig {
    /// Consecutive failures before an endpoint is disabled
    pub max_failures: u32,
    /// How long a disabled endpoint stays out of selection
    pub cooldown: Duration,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            max_failures: 4,
            cooldown: Duration::from_secs(30),
        }
    }
}

/// Retry configuration for failed operations.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of endpoint attempts before the fallback
    pub max_retries: u32,
    /// Delay after the first failed attempt in milliseconds
    pub initial_delay_ms: u64,
    /// Maximum delay between attempts in milliseconds
    pub max_delay_ms: u64,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Transaction confirmation timeout in milliseconds
    pub confirmation_timeout_ms: u64,
    /// Interval between confirmation checks in milliseconds
    pub confirmation_poll_interval_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 1000,
            max_delay_ms: 5000,
            backoff_multiplier: 2.0,
            confirmation_timeout_ms: 60_000,
            confirmation_poll_interval_ms: 2000,
        }
    }
}

impl RetryConfig {
    /// Backoff before the attempt following failed attempt `attempt` (1-based).
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let delay = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(exponent);
        Duration::from_millis(delay.min(self.max_delay_ms as f64) as u64)
    }
}

/// Where rate-limiter permits are counted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RateLimitBackend {
    /// Permits are counted inside this process.
    #[default]
    InProcess,
    /// Permits are counted in a shared Redis instance so several processes
    /// draw from the same budget.
    Redis { url: String, key_prefix: String },
}

/// Rate limiting configuration for RPC requests.
///
/// Permits per interval come from the config source; this struct holds the
/// parts that are deployment settings.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum concurrent read calls
    pub max_concurrent_reads: usize,
    /// Maximum concurrent write calls
    pub max_concurrent_writes: usize,
    /// Interval after which the permit reservoir is refilled
    pub refill_interval: Duration,
    /// Permit counting backend
    pub backend: RateLimitBackend,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_concurrent_reads: 10,
            max_concurrent_writes: 5,
            refill_interval: Duration::from_secs(1),
            backend: RateLimitBackend::InProcess,
        }
    }
}

/// Cross-endpoint confirmation polling configuration.
#[derive(Debug, Clone)]
pub struct ConfirmationConfig {
    /// Number of sweeps over all endpoints
    pub max_attempts: u32,
    /// Delay between sweeps
    pub delay: Duration,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(2),
        }
    }
}

/// Main configuration for the LedgerGateway.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Last-resort endpoint
    pub fallback_url: String,
    /// Per-request timeout handed to every raw client
    pub request_timeout: Duration,
    /// SPL mints reported by balance queries
    pub tracked_mints: Vec<Pubkey>,
    /// Endpoint health configuration
    pub health: HealthConfig,
    /// Retry configuration
    pub retry: RetryConfig,
    /// Rate limiting configuration
    pub rate_limit: RateLimitConfig,
    /// Confirmation polling configuration
    pub confirmation: ConfirmationConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            fallback_url: DEFAULT_FALLBACK_URL.to_string(),
            request_timeout: Duration::from_secs(30),
            tracked_mints: vec![USDC_MINT, USDT_MINT],
            health: HealthConfig::default(),
            retry: RetryConfig::default(),
            rate_limit: RateLimitConfig::default(),
            confirmation: ConfirmationConfig::default(),
        }
    }
}

/// Builder for GatewayConfig.
#[derive(Default)]
pub struct GatewayConfigBuilder {
    fallback_url: Option<String>,
    request_timeout: Option<Duration>,
    tracked_mints: Option<Vec<Pubkey>>,
    health: Option<HealthConfig>,
    retry: Option<RetryConfig>,
    rate_limit: Option<RateLimitConfig>,
    confirmation: Option<ConfirmationConfig>,
}

impl GatewayConfigBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the fallback URL.
    pub fn fallback_url(mut self, url: impl Into<String>) -> Self {
        self.fallback_url = Some(url.into());
        self
    }

    /// Set the per-request timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Set the SPL mints reported by balance queries.
    pub fn tracked_mints(mut self, mints: Vec<Pubkey>) -> Self {
        self.tracked_mints = Some(mints);
        self
    }

    /// Set the endpoint health configuration.
    pub fn health(mut self, config: HealthConfig) -> Self {
        self.health = Some(config);
        self
    }

    /// Set the retry configuration.
    pub fn retry(mut self, config: RetryConfig) -> Self {
        self.retry = Some(config);
        self
    }

    /// Set the rate limiting configuration.
    pub fn rate_limit(mut self, config: RateLimitConfig) -> Self {
        self.rate_limit = Some(config);
        self
    }

    /// Set the confirmation polling configuration.
    pub fn confirmation(mut self, config: ConfirmationConfig) -> Self {
        self.confirmation = Some(config);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> Result<GatewayConfig, ConfigError> {
        let defaults = GatewayConfig::default();
        let config = GatewayConfig {
            fallback_url: self.fallback_url.unwrap_or(defaults.fallback_url),
            request_timeout: self.request_timeout.unwrap_or(defaults.request_timeout),
            tracked_mints: self.tracked_mints.unwrap_or(defaults.tracked_mints),
            health: self.health.unwrap_or_default(),
            retry: self.retry.unwrap_or_default(),
            rate_limit: self.rate_limit.unwrap_or_default(),
            confirmation: self.confirmation.unwrap_or_default(),
        };

        if config.fallback_url.trim().is_empty() {
            return Err(ConfigError::MissingField("fallback_url"));
        }
        if config.health.max_failures == 0 {
            return Err(ConfigError::Invalid("max_failures must be at least 1".into()));
        }
        if config.retry.max_retries == 0 {
            return Err(ConfigError::Invalid("max_retries must be at least 1".into()));
        }
        if config.rate_limit.max_concurrent_reads == 0 || config.rate_limit.max_concurrent_writes == 0 {
            return Err(ConfigError::Invalid("concurrency limits must be at least 1".into()));
        }
        if config.rate_limit.refill_interval.is_zero() {
            return Err(ConfigError::Invalid("refill_interval must be non-zero".into()));
        }
        if config.confirmation.max_attempts == 0 {
            return Err(ConfigError::Invalid("confirmation max_attempts must be at least 1".into()));
        }

        Ok(config)
    }
}

/// Error type for configuration issues.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("No RPC endpoints configured")]
    NoEndpoints,

    #[error("Duplicate endpoint: {0}")]
    DuplicateEndpoint(String),

    #[error("Rate limits must be positive (read {read}, write {write})")]
    InvalidRateLimits { read: u32, write: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_configs() {
        let health = HealthConfig::default();
        assert_eq!(health.max_failures, 4);
        assert_eq!(health.cooldown, Duration::from_secs(30));

        let retry = RetryConfig::default();
        assert_eq!(retry.max_retries, 3);
        assert_eq!(retry.initial_delay_ms, 1000);

        let confirmation = ConfirmationConfig::default();
        assert_eq!(confirmation.max_attempts, 3);
    }

    #[test]
    fn test_backoff_is_capped() {
        let retry = RetryConfig::default();
        assert_eq!(retry.backoff_delay(1), Duration::from_millis(1000));
        assert_eq!(retry.backoff_delay(2), Duration::from_millis(2000));
        assert_eq!(retry.backoff_delay(3), Duration::from_millis(4000));
        assert_eq!(retry.backoff_delay(4), Duration::from_millis(5000));
        assert_eq!(retry.backoff_delay(40), Duration::from_millis(5000));
    }

    #[test]
    fn test_builder_rejects_zero_retries() {
        let result = GatewayConfigBuilder::new()
            .retry(RetryConfig {
                max_retries: 0,
                ..Default::default()
            })
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_defaults() {
        let config = GatewayConfigBuilder::new()
            .fallback_url("http://localhost:8899")
            .build()
            .expect("Failed to build config");
        assert_eq!(config.fallback_url, "http://localhost:8899");
        assert_eq!(config.tracked_mints.len(), 2);
    }
}
