//! Cross-endpoint transaction receipt polling.
//!
//! A transaction submitted through one endpoint may become visible on
//! another first, so every sweep asks all known endpoints in order.

use std::sync::Arc;

use solana_sdk::signature::Signature;
use tokio::time::sleep;

use crate::config::ConfirmationConfig;
use crate::ledger::LedgerClient;
use crate::types::{ConfirmationLevel, ReceiptStatus, TransactionRecord};

/// Polls raw clients until one of them reports the transaction.
pub struct ConfirmationPoller {
    clients: Vec<Arc<dyn LedgerClient>>,
    config: ConfirmationConfig,
}

impl ConfirmationPoller {
    pub fn new(clients: Vec<Arc<dyn LedgerClient>>, config: ConfirmationConfig) -> Self {
        Self { clients, config }
    }

    /// Whether `signature` has landed, and how.
    ///
    /// Returns [`ReceiptStatus::not_found`] once every sweep is used up.
    /// Endpoint errors never surface; they are logged and the next endpoint
    /// is asked.
    pub async fn check_received(&self, signature: &Signature) -> ReceiptStatus {
        for sweep in 1..=self.config.max_attempts {
            for client in &self.clients {
                match client.get_parsed_transaction(signature).await {
                    Ok(Some(transaction)) => {
                        return self.receipt(client.as_ref(), signature, transaction).await;
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::warn!(
                            endpoint = %client.url(),
                            sweep = sweep,
                            error = %e,
                            "Transaction lookup failed"
                        );
                    }
                }
            }

            if sweep < self.config.max_attempts {
                tracing::debug!(
                    signature = %signature,
                    sweep = sweep,
                    delay_ms = self.config.delay.as_millis() as u64,
                    "Transaction not visible yet"
                );
                sleep(self.config.delay).await;
            }
        }

        ReceiptStatus::not_found()
    }

    async fn receipt(
        &self,
        client: &dyn LedgerClient,
        signature: &Signature,
        transaction: TransactionRecord,
    ) -> ReceiptStatus {
        let status = match client.get_signature_statuses(&[*signature]).await {
            Ok(statuses) => statuses.into_iter().next().flatten(),
            Err(e) => {
                tracing::warn!(
                    endpoint = %client.url(),
                    error = %e,
                    "Signature status lookup failed"
                );
                None
            }
        };

        let error = status
            .as_ref()
            .and_then(|s| s.err.clone())
            .or(transaction.err);
        let is_finalized = status
            .as_ref()
            .and_then(|s| s.confirmation_status)
            .is_some_and(|level| level == ConfirmationLevel::Finalized);

        ReceiptStatus {
            exists: true,
            is_successful: error.is_none(),
            is_finalized,
            error,
        }
    }
}
