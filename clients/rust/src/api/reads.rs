//! Read query implementations.

use futures::future::join_all;
use solana_sdk::{
    hash::Hash, native_token::LAMPORTS_PER_SOL, pubkey::Pubkey, signature::Signature,
};

use crate::{
    errors::GatewayResult,
    gateway::LedgerGateway,
    types::{TokenAmount, TokenBalance, TransactionRecord, WalletBalance},
};

impl LedgerGateway {
    /// Look up a transaction. `None` when no endpoint has seen it.
    pub(crate) async fn get_transaction_data_impl(
        &self,
        signature: &Signature,
    ) -> GatewayResult<Option<TransactionRecord>> {
        let signature = *signature;
        self.executor()
            .await
            .execute(|client| async move { client.get_parsed_transaction(&signature).await })
            .await
    }

    /// Native balance plus every tracked mint, fetched concurrently.
    ///
    /// A failed lookup reports zero for that part instead of failing the
    /// whole query.
    pub(crate) async fn get_balance_impl(&self, address: &Pubkey) -> GatewayResult<WalletBalance> {
        let executor = self.executor().await;
        let owner = *address;

        let native = async {
            executor
                .execute(|client| async move { client.get_balance(&owner).await })
                .await
                .unwrap_or_else(|e| {
                    tracing::warn!(address = %owner, error = %e, "Native balance lookup failed");
                    0
                })
        };

        let tokens = join_all(self.config.tracked_mints.iter().map(|mint| {
            let executor = executor.clone();
            let mint = *mint;
            async move {
                match executor
                    .execute(|client| async move {
                        client.get_parsed_token_accounts_by_owner(&owner, &mint).await
                    })
                    .await
                {
                    Ok(accounts) => {
                        let decimals = accounts.first().map(|a| a.amount.decimals).unwrap_or(0);
                        let amount = accounts
                            .iter()
                            .fold(0u64, |sum, a| sum.saturating_add(a.amount.amount));
                        let total = TokenAmount::new(amount, decimals);
                        TokenBalance {
                            mint: mint.to_string(),
                            amount,
                            decimals,
                            ui_amount: total.ui_amount(),
                        }
                    }
                    Err(e) => {
                        tracing::warn!(
                            address = %owner,
                            mint = %mint,
                            error = %e,
                            "Token balance lookup failed"
                        );
                        TokenBalance::zero(&mint)
                    }
                }
            }
        }));

        let (lamports, tokens) = futures::join!(native, tokens);

        Ok(WalletBalance {
            address: owner.to_string(),
            lamports,
            sol: lamports as f64 / LAMPORTS_PER_SOL as f64,
            tokens,
        })
    }

    pub(crate) async fn get_latest_blockhash_impl(&self) -> GatewayResult<Hash> {
        self.executor()
            .await
            .execute(|client| async move { client.get_latest_blockhash().await })
            .await
    }

    /// Decimals of `mint` (cached after first fetch).
    pub(crate) async fn get_mint_decimals_impl(&self, mint: &Pubkey) -> GatewayResult<u8> {
        // Check cache first
        {
            let cache = self.decimals_cache.read().await;
            if let Some(decimals) = cache.get(mint) {
                return Ok(*decimals);
            }
        }

        let mint = *mint;
        let supply = self
            .executor()
            .await
            .execute(|client| async move { client.get_token_supply(&mint).await })
            .await?;

        let mut cache = self.decimals_cache.write().await;
        cache.insert(mint, supply.decimals);
        Ok(supply.decimals)
    }
}
