//! Ledger Gateway Client
//!
//! A resilient Solana RPC client spread over several endpoints.
//!
//! # Features
//!
//! - **Endpoint Failover**: Priority selection with health tracking and cooldown
//! - **Rate Limiting**: Separate read and write token buckets shared by all endpoints
//! - **Retry Logic**: Cross-endpoint retry with exponential backoff and a fallback endpoint
//! - **Confirmation Polling**: Find a submitted transaction on whichever endpoint sees it first
//! - **SPL Transfers**: Balance-checked transfers that create the destination account
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use ledger_gateway_client::{
//!     Endpoint, FileKeyProvider, GatewayConfig, LedgerGateway, LedgerReadApi, RateLimits,
//!     StaticConfigSource,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let source = StaticConfigSource::new(
//!         vec![Endpoint::new("https://rpc.example.com", 0, "primary")],
//!         RateLimits::default(),
//!     );
//!     let gateway = LedgerGateway::new(
//!         GatewayConfig::default(),
//!         Arc::new(source),
//!         Arc::new(FileKeyProvider::new("~/.config/solana/id.json")),
//!     );
//!
//!     let balance = gateway.get_balance(&address).await?;
//!     println!("{} SOL", balance.sol);
//!
//!     Ok(())
//! }
//! ```

// Core modules
pub mod api;
pub mod config;
pub mod confirmation;
pub mod errors;
pub mod gateway;
pub mod ledger;
pub mod providers;
pub mod rpc;
pub mod types;

// Re-exports for convenient access
pub use api::{DiagnosticsApi, LedgerReadApi, TransferApi};
pub use config::{
    ConfigError, ConfirmationConfig, GatewayConfig, GatewayConfigBuilder, HealthConfig,
    RateLimitBackend, RateLimitConfig, RetryConfig, DEFAULT_FALLBACK_URL, USDC_MINT, USDT_MINT,
};
pub use confirmation::ConfirmationPoller;
pub use errors::{ErrorCategory, GatewayError, GatewayResult};
pub use gateway::{GatewayRuntime, LedgerGateway};
pub use ledger::{LedgerClient, LedgerClientFactory, SolanaClientFactory, SolanaLedgerClient};
pub use providers::{
    merge_endpoints, CachedConfigSource, CachedKeyProvider, ConfigSnapshot, ConfigSource,
    EndpointsFile, FileConfigSource, FileKeyProvider, KeyProvider, StaticConfigSource,
    StaticKeyProvider, DEFAULT_CONFIG_TTL,
};
pub use rpc::{
    BucketConfig, EndpointManager, RateLimitedClient, RetryExecutor, RpcRateLimiter, TokenBucket,
};
pub use types::{
    AccountSummary, BucketStatus, ConfirmationLevel, Endpoint, EndpointHealth, EndpointStats,
    LimiterStatus, RateLimits, ReceiptStatus, SignatureStatusInfo, TokenAccountBalance,
    TokenAmount, TokenBalance, TransactionRecord, WalletBalance,
};
