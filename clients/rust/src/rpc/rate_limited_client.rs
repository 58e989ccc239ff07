//! Rate-limited decorator over a raw [`LedgerClient`].

use std::sync::Arc;

use async_trait::async_trait;
use solana_sdk::{
    commitment_config::CommitmentConfig, hash::Hash, pubkey::Pubkey, signature::Signature,
    transaction::Transaction,
};

use super::rate_limiter::RpcRateLimiter;
use crate::errors::GatewayResult;
use crate::ledger::LedgerClient;
use crate::types::{
    AccountSummary, SignatureStatusInfo, TokenAccountBalance, TokenAmount, TransactionRecord,
};

/// Wraps a raw client so every call is admitted by the shared limiter.
///
/// Reads go through the read bucket. Transaction submission and
/// confirmation go through the write bucket.
pub struct RateLimitedClient {
    inner: Arc<dyn LedgerClient>,
    limiter: Arc<RpcRateLimiter>,
}

impl RateLimitedClient {
    pub fn new(inner: Arc<dyn LedgerClient>, limiter: Arc<RpcRateLimiter>) -> Self {
        Self { inner, limiter }
    }

    /// The unwrapped client.
    pub fn inner(&self) -> &Arc<dyn LedgerClient> {
        &self.inner
    }

    pub fn limiter(&self) -> &Arc<RpcRateLimiter> {
        &self.limiter
    }
}

#[async_trait]
impl LedgerClient for RateLimitedClient {
    fn url(&self) -> &str {
        self.inner.url()
    }

    async fn get_balance(&self, address: &Pubkey) -> GatewayResult<u64> {
        self.limiter
            .read()
            .schedule(|| self.inner.get_balance(address))
            .await
    }

    async fn get_token_account_balance(&self, token_account: &Pubkey) -> GatewayResult<TokenAmount> {
        self.limiter
            .read()
            .schedule(|| self.inner.get_token_account_balance(token_account))
            .await
    }

    async fn get_parsed_token_accounts_by_owner(
        &self,
        owner: &Pubkey,
        mint: &Pubkey,
    ) -> GatewayResult<Vec<TokenAccountBalance>> {
        self.limiter
            .read()
            .schedule(|| self.inner.get_parsed_token_accounts_by_owner(owner, mint))
            .await
    }

    async fn get_token_supply(&self, mint: &Pubkey) -> GatewayResult<TokenAmount> {
        self.limiter
            .read()
            .schedule(|| self.inner.get_token_supply(mint))
            .await
    }

    async fn get_account_info(&self, address: &Pubkey) -> GatewayResult<Option<AccountSummary>> {
        self.limiter
            .read()
            .schedule(|| self.inner.get_account_info(address))
            .await
    }

    async fn get_latest_blockhash(&self) -> GatewayResult<Hash> {
        self.limiter
            .read()
            .schedule(|| self.inner.get_latest_blockhash())
            .await
    }

    async fn send_raw_transaction(&self, transaction: &Transaction) -> GatewayResult<Signature> {
        self.limiter
            .write()
            .schedule(|| self.inner.send_raw_transaction(transaction))
            .await
    }

    async fn confirm_transaction(
        &self,
        signature: &Signature,
        commitment: CommitmentConfig,
    ) -> GatewayResult<bool> {
        self.limiter
            .write()
            .schedule(|| self.inner.confirm_transaction(signature, commitment))
            .await
    }

    async fn get_parsed_transaction(
        &self,
        signature: &Signature,
    ) -> GatewayResult<Option<TransactionRecord>> {
        self.limiter
            .read()
            .schedule(|| self.inner.get_parsed_transaction(signature))
            .await
    }

    async fn get_signature_statuses(
        &self,
        signatures: &[Signature],
    ) -> GatewayResult<Vec<Option<SignatureStatusInfo>>> {
        self.limiter
            .read()
            .schedule(|| self.inner.get_signature_statuses(signatures))
            .await
    }
}
