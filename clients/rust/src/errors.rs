//! Error types for the ledger gateway.
//!
//! Errors carry enough classification for the retry executor to decide
//! whether a failure should be retried on another endpoint, counted against
//! the endpoint's health, or returned to the caller untouched.

use thiserror::Error;

/// Main error type for gateway operations.
#[derive(Error, Debug)]
pub enum GatewayError {
    // Network Errors
    #[error("RPC error: {0}")]
    Rpc(#[from] solana_client::client_error::ClientError),

    #[error("Transport error: {message}")]
    Transport { message: String },

    #[error("Rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("Connection timeout")]
    ConnectionTimeout,

    // Endpoint Errors
    #[error("No healthy endpoints available")]
    NoHealthyEndpoints,

    #[error("Endpoint {endpoint} failed on attempt {attempt}: {source}")]
    Endpoint {
        endpoint: String,
        attempt: u32,
        #[source]
        source: Box<GatewayError>,
    },

    #[error("Unexpected response from {endpoint}: {message}")]
    MalformedResponse { endpoint: String, message: String },

    // Lifecycle Errors
    #[error("Rate limiter closed")]
    LimiterClosed,

    // Transaction Errors
    #[error("Confirmation timeout after {timeout_ms}ms")]
    ConfirmationTimeout { timeout_ms: u64 },

    #[error("Transaction rejected: {reason}")]
    TransactionRejected { reason: String },

    // Configuration Errors
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    // Wallet Errors
    #[error("Wallet not initialized")]
    WalletNotInitialized,

    #[error("Signer {signer} cannot authorize transfers from {owner}")]
    SignerMismatch { signer: String, owner: String },

    // Input Validation Errors
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // Account Errors
    #[error("Insufficient balance: need {required}, have {available}")]
    InsufficientBalance { required: u64, available: u64 },

    // Internal Errors
    #[error("{0}")]
    Internal(#[from] anyhow::Error),
}

impl GatewayError {
    /// Check if this error is retryable.
    ///
    /// Retryable errors are transient network or provider issues that may
    /// succeed on retry, possibly against a different endpoint.
    pub fn is_retryable(&self) -> bool {
        match self {
            GatewayError::Rpc(_)
            | GatewayError::Transport { .. }
            | GatewayError::RateLimited { .. }
            | GatewayError::ConnectionTimeout
            | GatewayError::MalformedResponse { .. }
            | GatewayError::ConfirmationTimeout { .. } => true,
            GatewayError::Endpoint { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    /// Check if this error should be recorded against the endpoint that
    /// produced it.
    ///
    /// Business-logic rejections are not endpoint failures: they are raised
    /// immediately and leave endpoint health untouched.
    pub fn is_endpoint_failure(&self) -> bool {
        match self {
            GatewayError::InsufficientBalance { .. }
            | GatewayError::InvalidAmount(_)
            | GatewayError::InvalidInput(_)
            | GatewayError::SignerMismatch { .. }
            | GatewayError::WalletNotInitialized
            | GatewayError::TransactionRejected { .. }
            | GatewayError::InvalidConfig { .. } => false,
            GatewayError::Endpoint { source, .. } => source.is_endpoint_failure(),
            _ => true,
        }
    }

    /// Get a retry hint in milliseconds, if available.
    pub fn retry_hint_ms(&self) -> Option<u64> {
        match self {
            GatewayError::RateLimited { retry_after_ms } => Some(*retry_after_ms),
            GatewayError::ConnectionTimeout => Some(1000),
            GatewayError::Endpoint { source, .. } => source.retry_hint_ms(),
            _ => None,
        }
    }

    /// Categorize the error for logging.
    pub fn category(&self) -> ErrorCategory {
        match self {
            GatewayError::Rpc(_)
            | GatewayError::Transport { .. }
            | GatewayError::RateLimited { .. }
            | GatewayError::ConnectionTimeout => ErrorCategory::Network,

            GatewayError::NoHealthyEndpoints | GatewayError::MalformedResponse { .. } => {
                ErrorCategory::Endpoint
            }
            GatewayError::Endpoint { source, .. } => source.category(),

            GatewayError::ConfirmationTimeout { .. } | GatewayError::TransactionRejected { .. } => {
                ErrorCategory::Transaction
            }

            GatewayError::InvalidConfig { .. } => ErrorCategory::Config,

            GatewayError::WalletNotInitialized | GatewayError::SignerMismatch { .. } => {
                ErrorCategory::Wallet
            }

            GatewayError::InvalidAmount(_) | GatewayError::InvalidInput(_) => {
                ErrorCategory::Validation
            }

            GatewayError::InsufficientBalance { .. } => ErrorCategory::Account,

            GatewayError::LimiterClosed | GatewayError::Internal(_) => ErrorCategory::Internal,
        }
    }

    /// Attribute an error to the endpoint and attempt that produced it.
    pub fn at_endpoint(self, endpoint: impl Into<String>, attempt: u32) -> Self {
        GatewayError::Endpoint {
            endpoint: endpoint.into(),
            attempt,
            source: Box::new(self),
        }
    }

    /// Create a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        GatewayError::Transport {
            message: message.into(),
        }
    }

    /// Create a malformed response error.
    pub fn malformed(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        GatewayError::MalformedResponse {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }
}

/// Error category for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Network-related errors (RPC, rate limiting, timeouts)
    Network,
    /// Endpoint selection and response errors
    Endpoint,
    /// Transaction-related errors (confirmation, rejection)
    Transaction,
    /// Configuration errors
    Config,
    /// Signing key errors
    Wallet,
    /// Input validation errors
    Validation,
    /// Account-related errors (insufficient balance)
    Account,
    /// Internal errors (unexpected failures)
    Internal,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Network => write!(f, "network"),
            ErrorCategory::Endpoint => write!(f, "endpoint"),
            ErrorCategory::Transaction => write!(f, "transaction"),
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Wallet => write!(f, "wallet"),
            ErrorCategory::Validation => write!(f, "validation"),
            ErrorCategory::Account => write!(f, "account"),
            ErrorCategory::Internal => write!(f, "internal"),
        }
    }
}

/// Result type alias for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;
