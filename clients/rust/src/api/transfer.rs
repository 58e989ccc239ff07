//! SPL token transfer implementations.

use std::time::Duration;

use solana_sdk::{
    commitment_config::CommitmentConfig,
    pubkey::Pubkey,
    signature::{Signature, Signer},
    transaction::Transaction,
};
use spl_associated_token_account::{
    get_associated_token_address, instruction::create_associated_token_account,
};
use tokio::time::{sleep, Instant};

use crate::{errors::GatewayError, errors::GatewayResult, gateway::LedgerGateway, types::ReceiptStatus};

/// Convert a UI amount to base units, rounding down.
pub(crate) fn to_base_units(amount: f64, decimals: u8) -> GatewayResult<u64> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(GatewayError::InvalidAmount(format!(
            "amount must be a positive number, got {}",
            amount
        )));
    }

    let scaled = (amount * 10f64.powi(decimals as i32)).floor();
    if scaled < 1.0 {
        return Err(GatewayError::InvalidAmount(format!(
            "{} is below the smallest unit of a {}-decimal mint",
            amount, decimals
        )));
    }
    if scaled >= u64::MAX as f64 {
        return Err(GatewayError::InvalidAmount(format!("{} is too large", amount)));
    }
    Ok(scaled as u64)
}

impl LedgerGateway {
    /// Transfer `amount` of `mint` from `from` to `to` and wait until the
    /// transfer is finalized.
    pub(crate) async fn send_spl_token_impl(
        &self,
        to: &Pubkey,
        amount: f64,
        from: &Pubkey,
        mint: &Pubkey,
    ) -> GatewayResult<Signature> {
        let (to, from, mint) = (*to, *from, *mint);

        let decimals = match self.get_mint_decimals_impl(&mint).await {
            Ok(decimals) => decimals,
            Err(e) => {
                tracing::warn!(mint = %mint, error = %e, "Mint decimals lookup failed, assuming 0");
                0
            }
        };
        let base_units = to_base_units(amount, decimals)?;

        let signer = self.key_provider.get_keypair().await?;
        if signer.pubkey() != from {
            return Err(GatewayError::SignerMismatch {
                signer: signer.pubkey().to_string(),
                owner: from.to_string(),
            });
        }

        let executor = self.executor().await;

        let accounts = executor
            .execute(|client| async move { client.get_parsed_token_accounts_by_owner(&from, &mint).await })
            .await?;
        let available = accounts
            .iter()
            .fold(0u64, |sum, a| sum.saturating_add(a.amount.amount));
        if available < base_units {
            return Err(GatewayError::InsufficientBalance {
                required: base_units,
                available,
            });
        }

        let source = get_associated_token_address(&from, &mint);
        let destination = get_associated_token_address(&to, &mint);
        let destination_exists = executor
            .execute(|client| async move { client.get_account_info(&destination).await })
            .await?
            .is_some();

        let mut instructions = Vec::with_capacity(2);
        if !destination_exists {
            tracing::info!(owner = %to, account = %destination, "Creating destination token account");
            instructions.push(create_associated_token_account(
                &from,
                &to,
                &mint,
                &spl_token::id(),
            ));
        }
        instructions.push(
            spl_token::instruction::transfer(
                &spl_token::id(),
                &source,
                &destination,
                &from,
                &[],
                base_units,
            )
            .map_err(|e| GatewayError::Internal(e.into()))?,
        );

        let blockhash = executor
            .execute(|client| async move { client.get_latest_blockhash().await })
            .await?;
        let transaction = Transaction::new_signed_with_payer(
            &instructions,
            Some(&from),
            &[signer.as_ref()],
            blockhash,
        );

        let transaction = &transaction;
        let signature = executor
            .execute(|client| async move { client.send_raw_transaction(transaction).await })
            .await?;

        tracing::info!(
            signature = %signature,
            mint = %mint,
            amount = base_units,
            "SPL transfer submitted"
        );

        self.wait_for_finalization(&signature).await?;
        Ok(signature)
    }

    /// Poll `confirm_transaction` at finalized commitment until it succeeds
    /// or the confirmation timeout passes.
    async fn wait_for_finalization(&self, signature: &Signature) -> GatewayResult<()> {
        let retry = &self.config.retry;
        let timeout = Duration::from_millis(retry.confirmation_timeout_ms);
        let poll_interval = Duration::from_millis(retry.confirmation_poll_interval_ms);
        let deadline = Instant::now() + timeout;
        let signature = *signature;
        let executor = self.executor().await;

        loop {
            match executor
                .execute(|client| async move {
                    client
                        .confirm_transaction(&signature, CommitmentConfig::finalized())
                        .await
                })
                .await
            {
                Ok(true) => {
                    tracing::info!(signature = %signature, "Transfer finalized");
                    return Ok(());
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(signature = %signature, error = %e, "Confirmation check failed");
                }
            }

            let now = Instant::now();
            if now >= deadline {
                break;
            }
            sleep(poll_interval.min(deadline - now)).await;
        }

        // Tell a failed transaction apart from a slow one.
        let status = executor
            .execute(|client| async move { client.get_signature_statuses(&[signature]).await })
            .await
            .ok()
            .and_then(|statuses| statuses.into_iter().next().flatten());

        match status.and_then(|s| s.err) {
            Some(reason) => Err(GatewayError::TransactionRejected { reason }),
            None => Err(GatewayError::ConfirmationTimeout {
                timeout_ms: retry.confirmation_timeout_ms,
            }),
        }
    }

    /// Transfer and then check every endpoint for the receipt.
    pub(crate) async fn send_and_verify_spl_token_impl(
        &self,
        to: &Pubkey,
        amount: f64,
        from: &Pubkey,
        mint: &Pubkey,
    ) -> GatewayResult<(Signature, ReceiptStatus)> {
        let signature = self.send_spl_token_impl(to, amount, from, mint).await?;
        let receipt = self
            .confirmation_poller()
            .await
            .check_received(&signature)
            .await;
        Ok((signature, receipt))
    }
}
