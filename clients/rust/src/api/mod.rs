//! API traits for the ledger gateway.
//!
//! This module defines the public API traits that the LedgerGateway
//! implements: ledger reads, SPL transfers and endpoint diagnostics.

pub mod diagnostics;
pub mod reads;
pub mod transfer;

use async_trait::async_trait;
use solana_sdk::{hash::Hash, pubkey::Pubkey, signature::Signature};

use crate::{
    errors::GatewayResult,
    gateway::LedgerGateway,
    types::{
        Endpoint, EndpointHealth, EndpointStats, LimiterStatus, ReceiptStatus, TransactionRecord,
        WalletBalance,
    },
};

/// Ledger read operations, retried across endpoints.
#[async_trait]
pub trait LedgerReadApi: Send + Sync {
    /// Get a parsed transaction, or `None` if it is not visible yet.
    async fn get_transaction_data(
        &self,
        signature: &Signature,
    ) -> GatewayResult<Option<TransactionRecord>>;

    /// Get native and tracked token balances of an address.
    ///
    /// Parts that cannot be fetched are reported as zero.
    async fn get_balance(&self, address: &Pubkey) -> GatewayResult<WalletBalance>;

    async fn get_latest_blockhash(&self) -> GatewayResult<Hash>;

    /// Get the decimals of a mint.
    async fn get_mint_decimals(&self, mint: &Pubkey) -> GatewayResult<u8>;
}

/// SPL token transfers signed by the gateway's key provider.
#[async_trait]
pub trait TransferApi: Send + Sync {
    /// Transfer `amount` (in UI units) of `mint` and wait for finalization.
    ///
    /// The destination token account is created when missing. Fails
    /// without touching endpoint health when the signer is not `from`,
    /// the amount is invalid or the balance is insufficient.
    async fn send_spl_token(
        &self,
        to: &Pubkey,
        amount: f64,
        from: &Pubkey,
        mint: &Pubkey,
    ) -> GatewayResult<Signature>;

    /// Transfer, then poll every endpoint for the receipt.
    async fn send_and_verify_spl_token(
        &self,
        to: &Pubkey,
        amount: f64,
        from: &Pubkey,
        mint: &Pubkey,
    ) -> GatewayResult<(Signature, ReceiptStatus)>;
}

/// Endpoint and limiter diagnostics.
#[async_trait]
pub trait DiagnosticsApi: Send + Sync {
    /// Every configured endpoint followed by the fallback endpoint.
    async fn get_all_rpc_endpoints(&self) -> Vec<Endpoint>;

    /// Ask a specific endpoint for a transaction.
    async fn get_transaction_from_endpoint(
        &self,
        signature: &Signature,
        url: &str,
    ) -> GatewayResult<Option<TransactionRecord>>;

    async fn get_endpoint_health(&self) -> Vec<EndpointHealth>;

    async fn get_endpoint_stats(&self) -> EndpointStats;

    /// Clear the failure state of every endpoint.
    async fn reset_endpoints(&self);

    async fn get_limiter_status(&self) -> LimiterStatus;

    /// Whether the gateway runs on the fallback endpoint only because
    /// initialization failed.
    async fn is_degraded(&self) -> bool;

    /// Check whether a transaction has landed on any endpoint.
    async fn check_received(&self, signature: &Signature) -> ReceiptStatus;
}

#[async_trait]
impl LedgerReadApi for LedgerGateway {
    async fn get_transaction_data(
        &self,
        signature: &Signature,
    ) -> GatewayResult<Option<TransactionRecord>> {
        self.get_transaction_data_impl(signature).await
    }

    async fn get_balance(&self, address: &Pubkey) -> GatewayResult<WalletBalance> {
        self.get_balance_impl(address).await
    }

    async fn get_latest_blockhash(&self) -> GatewayResult<Hash> {
        self.get_latest_blockhash_impl().await
    }

    async fn get_mint_decimals(&self, mint: &Pubkey) -> GatewayResult<u8> {
        self.get_mint_decimals_impl(mint).await
    }
}

#[async_trait]
impl TransferApi for LedgerGateway {
    async fn send_spl_token(
        &self,
        to: &Pubkey,
        amount: f64,
        from: &Pubkey,
        mint: &Pubkey,
    ) -> GatewayResult<Signature> {
        self.send_spl_token_impl(to, amount, from, mint).await
    }

    async fn send_and_verify_spl_token(
        &self,
        to: &Pubkey,
        amount: f64,
        from: &Pubkey,
        mint: &Pubkey,
    ) -> GatewayResult<(Signature, ReceiptStatus)> {
        self.send_and_verify_spl_token_impl(to, amount, from, mint)
            .await
    }
}

#[async_trait]
impl DiagnosticsApi for LedgerGateway {
    async fn get_all_rpc_endpoints(&self) -> Vec<Endpoint> {
        self.get_all_rpc_endpoints_impl().await
    }

    async fn get_transaction_from_endpoint(
        &self,
        signature: &Signature,
        url: &str,
    ) -> GatewayResult<Option<TransactionRecord>> {
        self.get_transaction_from_endpoint_impl(signature, url)
            .await
    }

    async fn get_endpoint_health(&self) -> Vec<EndpointHealth> {
        self.get_endpoint_health_impl().await
    }

    async fn get_endpoint_stats(&self) -> EndpointStats {
        self.get_endpoint_stats_impl().await
    }

    async fn reset_endpoints(&self) {
        self.reset_endpoints_impl().await
    }

    async fn get_limiter_status(&self) -> LimiterStatus {
        self.get_limiter_status_impl().await
    }

    async fn is_degraded(&self) -> bool {
        self.is_degraded_impl().await
    }

    async fn check_received(&self, signature: &Signature) -> ReceiptStatus {
        self.confirmation_poller()
            .await
            .check_received(signature)
            .await
    }
}
