//! Ledger client capability traits.
//!
//! [`LedgerClient`] is the set of ledger primitives the gateway needs from a
//! single endpoint. Raw clients, rate-limited wrappers and test doubles all
//! implement it, so callers never care which one they hold.

pub mod solana;

use std::sync::Arc;

use async_trait::async_trait;
use solana_sdk::{
    commitment_config::CommitmentConfig, hash::Hash, pubkey::Pubkey, signature::Signature,
    transaction::Transaction,
};

use crate::{
    errors::GatewayResult,
    types::{AccountSummary, SignatureStatusInfo, TokenAccountBalance, TokenAmount, TransactionRecord},
};

pub use solana::{SolanaClientFactory, SolanaLedgerClient};

/// Read and write primitives of one ledger endpoint.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// URL of the endpoint this client talks to.
    fn url(&self) -> &str;

    /// Native balance in lamports.
    async fn get_balance(&self, address: &Pubkey) -> GatewayResult<u64>;

    /// Balance of a single token account.
    async fn get_token_account_balance(&self, token_account: &Pubkey) -> GatewayResult<TokenAmount>;

    /// All token accounts of `owner` for `mint`, parsed.
    async fn get_parsed_token_accounts_by_owner(
        &self,
        owner: &Pubkey,
        mint: &Pubkey,
    ) -> GatewayResult<Vec<TokenAccountBalance>>;

    /// Total supply of `mint`, which also carries its decimals.
    async fn get_token_supply(&self, mint: &Pubkey) -> GatewayResult<TokenAmount>;

    /// Account summary, or `None` when the account does not exist.
    async fn get_account_info(&self, address: &Pubkey) -> GatewayResult<Option<AccountSummary>>;

    async fn get_latest_blockhash(&self) -> GatewayResult<Hash>;

    /// Submit a signed transaction without waiting for confirmation.
    async fn send_raw_transaction(&self, transaction: &Transaction) -> GatewayResult<Signature>;

    /// Whether `signature` has reached `commitment` without error.
    async fn confirm_transaction(
        &self,
        signature: &Signature,
        commitment: CommitmentConfig,
    ) -> GatewayResult<bool>;

    /// Parsed transaction, or `None` when the endpoint has not seen it.
    async fn get_parsed_transaction(
        &self,
        signature: &Signature,
    ) -> GatewayResult<Option<TransactionRecord>>;

    /// Status per signature, `None` for signatures the endpoint has not seen.
    async fn get_signature_statuses(
        &self,
        signatures: &[Signature],
    ) -> GatewayResult<Vec<Option<SignatureStatusInfo>>>;
}

/// Creates raw ledger clients for endpoint URLs.
pub trait LedgerClientFactory: Send + Sync {
    fn create(&self, url: &str) -> Arc<dyn LedgerClient>;
}
