//! Domain types shared by the gateway, its ledger clients and its
//! collaborators.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

/// One remote RPC provider for the ledger.
///
/// Endpoints are uniquely identified by `url`. Lower `priority` is more
/// preferred; `0` is the primary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub url: String,
    #[serde(default)]
    pub priority: u32,
    #[serde(default)]
    pub name: String,
}

impl Endpoint {
    pub fn new(url: impl Into<String>, priority: u32, name: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            priority,
            name: name.into(),
        }
    }
}

/// Read and write permits per second, as supplied by the config source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimits {
    pub read_limit: u32,
    pub write_limit: u32,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            read_limit: 10,
            write_limit: 5,
        }
    }
}

/// Snapshot of the mutable health state of one endpoint.
#[derive(Debug, Clone)]
pub struct EndpointHealth {
    pub endpoint: Endpoint,
    pub is_healthy: bool,
    pub failure_count: u32,
    pub last_failure: Option<Instant>,
    pub last_success: Option<Instant>,
    pub disabled_until: Option<Instant>,
}

impl EndpointHealth {
    pub(crate) fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            is_healthy: true,
            failure_count: 0,
            last_failure: None,
            last_success: None,
            disabled_until: None,
        }
    }

    /// Whether the endpoint is disabled by cooldown at `now`.
    pub fn is_disabled_at(&self, now: Instant) -> bool {
        self.disabled_until.is_some_and(|until| now < until)
    }

    /// Whether the endpoint may be selected at `now`.
    pub fn is_selectable_at(&self, now: Instant) -> bool {
        self.is_healthy && !self.is_disabled_at(now)
    }
}

/// Aggregate endpoint counts for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EndpointStats {
    pub total: usize,
    pub healthy: usize,
    pub unhealthy: usize,
    pub disabled: usize,
}

/// Runtime counters of one rate-limiter bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BucketStatus {
    pub queued: usize,
    pub running: usize,
}

/// Runtime counters of the read and write buckets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LimiterStatus {
    pub read: BucketStatus,
    pub write: BucketStatus,
}

/// A token amount in base units together with the mint's decimals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenAmount {
    pub amount: u64,
    pub decimals: u8,
}

impl TokenAmount {
    pub fn new(amount: u64, decimals: u8) -> Self {
        Self { amount, decimals }
    }

    /// The amount scaled by the mint's decimals.
    pub fn ui_amount(&self) -> f64 {
        self.amount as f64 / 10f64.powi(self.decimals as i32)
    }
}

/// One SPL token account owned by a wallet.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenAccountBalance {
    pub address: Pubkey,
    pub mint: Pubkey,
    pub amount: TokenAmount,
}

/// Summary of an on-chain account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountSummary {
    pub lamports: u64,
    pub owner: Pubkey,
    pub data_len: usize,
    pub executable: bool,
}

/// Confirmation level reported for a signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfirmationLevel {
    Processed,
    Confirmed,
    Finalized,
}

impl ConfirmationLevel {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "processed" => Some(Self::Processed),
            "confirmed" => Some(Self::Confirmed),
            "finalized" => Some(Self::Finalized),
            _ => None,
        }
    }
}

impl std::fmt::Display for ConfirmationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Processed => write!(f, "processed"),
            Self::Confirmed => write!(f, "confirmed"),
            Self::Finalized => write!(f, "finalized"),
        }
    }
}

/// Status of a submitted signature as reported by one endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct SignatureStatusInfo {
    pub slot: u64,
    pub confirmations: Option<u64>,
    /// Execution error, rendered as the endpoint reported it.
    pub err: Option<String>,
    pub confirmation_status: Option<ConfirmationLevel>,
}

/// A parsed transaction as returned by a transaction lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRecord {
    pub signature: String,
    pub slot: u64,
    pub block_time: Option<i64>,
    /// Execution error from the transaction meta, if any.
    pub err: Option<String>,
    pub fee: Option<u64>,
    pub log_messages: Vec<String>,
}

/// Balance of one tracked SPL mint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenBalance {
    pub mint: String,
    pub amount: u64,
    pub decimals: u8,
    pub ui_amount: f64,
}

impl TokenBalance {
    pub(crate) fn zero(mint: &Pubkey) -> Self {
        Self {
            mint: mint.to_string(),
            amount: 0,
            decimals: 0,
            ui_amount: 0.0,
        }
    }
}

/// Native and tracked token balances of one address.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WalletBalance {
    pub address: String,
    pub lamports: u64,
    pub sol: f64,
    pub tokens: Vec<TokenBalance>,
}

/// Cross-endpoint view of whether a transaction has landed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptStatus {
    pub exists: bool,
    pub is_successful: bool,
    pub is_finalized: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ReceiptStatus {
    pub fn not_found() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_selectable_respects_cooldown() {
        let now = Instant::now();
        let mut health = EndpointHealth::new(Endpoint::new("https://a", 0, "a"));
        assert!(health.is_selectable_at(now));

        health.disabled_until = Some(now + Duration::from_secs(30));
        health.is_healthy = true;
        assert!(!health.is_selectable_at(now));
        assert!(health.is_selectable_at(now + Duration::from_secs(30)));
    }

    #[test]
    fn test_ui_amount() {
        assert_eq!(TokenAmount::new(1_500_000, 6).ui_amount(), 1.5);
        assert_eq!(TokenAmount::new(7, 0).ui_amount(), 7.0);
    }

    #[test]
    fn test_confirmation_level_parse() {
        assert_eq!(
            ConfirmationLevel::parse("finalized"),
            Some(ConfirmationLevel::Finalized)
        );
        assert_eq!(ConfirmationLevel::parse("rooted"), None);
    }
}
