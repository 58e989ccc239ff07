//! RPC utilities for endpoint selection, rate limiting and retry logic.
//!
//! This module provides:
//! - `EndpointManager` - Health tracking and priority selection
//! - `RpcRateLimiter` - Read and write token buckets
//! - `RateLimitedClient` - Decorator admitting every call through the limiter
//! - `RetryExecutor` - Cross-endpoint retry with backoff and fallback

pub mod endpoint_manager;
pub mod rate_limited_client;
pub mod rate_limiter;
pub mod retry;

pub use endpoint_manager::EndpointManager;
pub use rate_limited_client::RateLimitedClient;
pub use rate_limiter::{BucketConfig, RateLimitGuard, RpcRateLimiter, TokenBucket};
pub use retry::RetryExecutor;
