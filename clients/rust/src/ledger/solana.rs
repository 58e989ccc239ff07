//! [`LedgerClient`] backed by the nonblocking Solana `RpcClient`.
//!
//! Typed `RpcClient` helpers are used where they return plain SDK types.
//! Token and transaction lookups go through `RpcClient::send` with
//! `jsonParsed` encoding and are decoded into the small response structs
//! below, so a missing transaction comes back as `None` instead of an error.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use solana_client::{nonblocking::rpc_client::RpcClient, rpc_request::RpcRequest};
use solana_sdk::{
    commitment_config::CommitmentConfig, hash::Hash, pubkey::Pubkey, signature::Signature,
    transaction::Transaction,
};

use super::{LedgerClient, LedgerClientFactory};
use crate::{
    errors::{GatewayError, GatewayResult},
    types::{
        AccountSummary, ConfirmationLevel, SignatureStatusInfo, TokenAccountBalance, TokenAmount,
        TransactionRecord,
    },
};

/// Raw ledger client for one Solana RPC endpoint.
pub struct SolanaLedgerClient {
    url: String,
    rpc: RpcClient,
    commitment: CommitmentConfig,
}

impl SolanaLedgerClient {
    pub fn new(url: impl Into<String>, timeout: Duration, commitment: CommitmentConfig) -> Self {
        let url = url.into();
        let rpc = RpcClient::new_with_timeout_and_commitment(url.clone(), timeout, commitment);
        Self {
            url,
            rpc,
            commitment,
        }
    }

    /// Get the underlying RPC client for advanced operations.
    pub fn rpc(&self) -> &RpcClient {
        &self.rpc
    }

    fn commitment_name(&self) -> String {
        self.commitment.commitment.to_string()
    }
}

#[async_trait]
impl LedgerClient for SolanaLedgerClient {
    fn url(&self) -> &str {
        &self.url
    }

    async fn get_balance(&self, address: &Pubkey) -> GatewayResult<u64> {
        Ok(self.rpc.get_balance(address).await?)
    }

    async fn get_token_account_balance(&self, token_account: &Pubkey) -> GatewayResult<TokenAmount> {
        let response: RpcContextual<RpcTokenAmount> = self
            .rpc
            .send(
                RpcRequest::GetTokenAccountBalance,
                json!([token_account.to_string(), { "commitment": self.commitment_name() }]),
            )
            .await?;
        response.value.into_token_amount(&self.url)
    }

    async fn get_parsed_token_accounts_by_owner(
        &self,
        owner: &Pubkey,
        mint: &Pubkey,
    ) -> GatewayResult<Vec<TokenAccountBalance>> {
        let response: RpcContextual<Vec<RpcKeyedTokenAccount>> = self
            .rpc
            .send(
                RpcRequest::GetTokenAccountsByOwner,
                json!([
                    owner.to_string(),
                    { "mint": mint.to_string() },
                    { "encoding": "jsonParsed", "commitment": self.commitment_name() }
                ]),
            )
            .await?;

        response
            .value
            .into_iter()
            .map(|keyed| keyed.into_balance(&self.url))
            .collect()
    }

    async fn get_token_supply(&self, mint: &Pubkey) -> GatewayResult<TokenAmount> {
        let response: RpcContextual<RpcTokenAmount> = self
            .rpc
            .send(
                RpcRequest::GetTokenSupply,
                json!([mint.to_string(), { "commitment": self.commitment_name() }]),
            )
            .await?;
        response.value.into_token_amount(&self.url)
    }

    async fn get_account_info(&self, address: &Pubkey) -> GatewayResult<Option<AccountSummary>> {
        let account = self
            .rpc
            .get_account_with_commitment(address, self.commitment)
            .await?
            .value;

        Ok(account.map(|account| AccountSummary {
            lamports: account.lamports,
            owner: account.owner,
            data_len: account.data.len(),
            executable: account.executable,
        }))
    }

    async fn get_latest_blockhash(&self) -> GatewayResult<Hash> {
        Ok(self.rpc.get_latest_blockhash().await?)
    }

    async fn send_raw_transaction(&self, transaction: &Transaction) -> GatewayResult<Signature> {
        Ok(self.rpc.send_transaction(transaction).await?)
    }

    async fn confirm_transaction(
        &self,
        signature: &Signature,
        commitment: CommitmentConfig,
    ) -> GatewayResult<bool> {
        Ok(self
            .rpc
            .confirm_transaction_with_commitment(signature, commitment)
            .await?
            .value)
    }

    async fn get_parsed_transaction(
        &self,
        signature: &Signature,
    ) -> GatewayResult<Option<TransactionRecord>> {
        // getTransaction does not accept `processed`.
        let response: Option<RpcTransaction> = self
            .rpc
            .send(
                RpcRequest::GetTransaction,
                json!([
                    signature.to_string(),
                    {
                        "encoding": "jsonParsed",
                        "commitment": "confirmed",
                        "maxSupportedTransactionVersion": 0
                    }
                ]),
            )
            .await?;

        Ok(response.map(|tx| tx.into_record(signature)))
    }

    async fn get_signature_statuses(
        &self,
        signatures: &[Signature],
    ) -> GatewayResult<Vec<Option<SignatureStatusInfo>>> {
        let encoded: Vec<String> = signatures.iter().map(ToString::to_string).collect();
        let response: RpcContextual<Vec<Option<RpcSignatureStatus>>> = self
            .rpc
            .send(
                RpcRequest::GetSignatureStatuses,
                json!([encoded, { "searchTransactionHistory": true }]),
            )
            .await?;

        Ok(response
            .value
            .into_iter()
            .map(|status| status.map(RpcSignatureStatus::into_info))
            .collect())
    }
}

/// Builds [`SolanaLedgerClient`]s with a shared timeout and commitment.
#[derive(Debug, Clone)]
pub struct SolanaClientFactory {
    timeout: Duration,
    commitment: CommitmentConfig,
}

impl SolanaClientFactory {
    pub fn new(timeout: Duration, commitment: CommitmentConfig) -> Self {
        Self {
            timeout,
            commitment,
        }
    }
}

impl Default for SolanaClientFactory {
    fn default() -> Self {
        Self::new(Duration::from_secs(30), CommitmentConfig::confirmed())
    }
}

impl LedgerClientFactory for SolanaClientFactory {
    fn create(&self, url: &str) -> Arc<dyn LedgerClient> {
        Arc::new(SolanaLedgerClient::new(url, self.timeout, self.commitment))
    }
}

// =========================================================================
// JSON-RPC response shapes
// =========================================================================

#[derive(Debug, Deserialize)]
struct RpcContextual<T> {
    value: T,
}

#[derive(Debug, Deserialize)]
struct RpcTokenAmount {
    amount: String,
    decimals: u8,
}

impl RpcTokenAmount {
    fn into_token_amount(self, endpoint: &str) -> GatewayResult<TokenAmount> {
        let amount = self.amount.parse::<u64>().map_err(|e| {
            GatewayError::malformed(endpoint, format!("invalid token amount {:?}: {}", self.amount, e))
        })?;
        Ok(TokenAmount::new(amount, self.decimals))
    }
}

#[derive(Debug, Deserialize)]
struct RpcKeyedTokenAccount {
    pubkey: String,
    account: RpcParsedAccount,
}

#[derive(Debug, Deserialize)]
struct RpcParsedAccount {
    data: RpcParsedData,
}

#[derive(Debug, Deserialize)]
struct RpcParsedData {
    parsed: RpcParsedTokenAccount,
}

#[derive(Debug, Deserialize)]
struct RpcParsedTokenAccount {
    info: RpcTokenAccountInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcTokenAccountInfo {
    mint: String,
    token_amount: RpcTokenAmount,
}

impl RpcKeyedTokenAccount {
    fn into_balance(self, endpoint: &str) -> GatewayResult<TokenAccountBalance> {
        let address = Pubkey::from_str(&self.pubkey)
            .map_err(|e| GatewayError::malformed(endpoint, format!("invalid account key: {}", e)))?;
        let info = self.account.data.parsed.info;
        let mint = Pubkey::from_str(&info.mint)
            .map_err(|e| GatewayError::malformed(endpoint, format!("invalid mint: {}", e)))?;
        Ok(TokenAccountBalance {
            address,
            mint,
            amount: info.token_amount.into_token_amount(endpoint)?,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcTransaction {
    slot: u64,
    block_time: Option<i64>,
    meta: Option<RpcTransactionMeta>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcTransactionMeta {
    err: Option<Value>,
    fee: Option<u64>,
    #[serde(default)]
    log_messages: Option<Vec<String>>,
}

impl RpcTransaction {
    fn into_record(self, signature: &Signature) -> TransactionRecord {
        let (err, fee, log_messages) = match self.meta {
            Some(meta) => (
                meta.err.map(|e| e.to_string()),
                meta.fee,
                meta.log_messages.unwrap_or_default(),
            ),
            None => (None, None, Vec::new()),
        };
        TransactionRecord {
            signature: signature.to_string(),
            slot: self.slot,
            block_time: self.block_time,
            err,
            fee,
            log_messages,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcSignatureStatus {
    slot: u64,
    confirmations: Option<u64>,
    err: Option<Value>,
    confirmation_status: Option<String>,
}

impl RpcSignatureStatus {
    fn into_info(self) -> SignatureStatusInfo {
        SignatureStatusInfo {
            slot: self.slot,
            confirmations: self.confirmations,
            err: self.err.map(|e| e.to_string()),
            confirmation_status: self
                .confirmation_status
                .as_deref()
                .and_then(ConfirmationLevel::parse),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_token_accounts_by_owner() {
        let owner_account = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let raw = json!({
            "context": { "slot": 10 },
            "value": [{
                "pubkey": owner_account.to_string(),
                "account": {
                    "data": {
                        "program": "spl-token",
                        "parsed": {
                            "type": "account",
                            "info": {
                                "mint": mint.to_string(),
                                "owner": Pubkey::new_unique().to_string(),
                                "tokenAmount": {
                                    "amount": "2500000",
                                    "decimals": 6,
                                    "uiAmount": 2.5,
                                    "uiAmountString": "2.5"
                                }
                            }
                        },
                        "space": 165
                    },
                    "executable": false,
                    "lamports": 2039280
                }
            }]
        });

        let parsed: RpcContextual<Vec<RpcKeyedTokenAccount>> =
            serde_json::from_value(raw).unwrap();
        let balances: Vec<_> = parsed
            .value
            .into_iter()
            .map(|a| a.into_balance("https://a").unwrap())
            .collect();

        assert_eq!(balances.len(), 1);
        assert_eq!(balances[0].address, owner_account);
        assert_eq!(balances[0].mint, mint);
        assert_eq!(balances[0].amount, TokenAmount::new(2_500_000, 6));
    }

    #[test]
    fn test_invalid_token_amount_is_malformed() {
        let raw = RpcTokenAmount {
            amount: "not-a-number".into(),
            decimals: 2,
        };
        let err = raw.into_token_amount("https://a").unwrap_err();
        assert!(matches!(err, GatewayError::MalformedResponse { .. }));
    }

    #[test]
    fn test_parse_transaction_with_error() {
        let signature = Signature::default();
        let raw = json!({
            "slot": 42,
            "blockTime": 1_700_000_000,
            "meta": {
                "err": { "InstructionError": [0, "Custom"] },
                "fee": 5000,
                "logMessages": ["Program log: boom"]
            },
            "transaction": {}
        });

        let tx: Option<RpcTransaction> = serde_json::from_value(raw).unwrap();
        let record = tx.unwrap().into_record(&signature);
        assert_eq!(record.slot, 42);
        assert_eq!(record.fee, Some(5000));
        assert!(record.err.unwrap().contains("InstructionError"));
        assert_eq!(record.log_messages.len(), 1);
    }

    #[test]
    fn test_missing_transaction_is_none() {
        let tx: Option<RpcTransaction> = serde_json::from_value(Value::Null).unwrap();
        assert!(tx.is_none());
    }

    #[test]
    fn test_parse_signature_statuses() {
        let raw = json!({
            "context": { "slot": 99 },
            "value": [
                { "slot": 90, "confirmations": null, "err": null, "confirmationStatus": "finalized", "status": { "Ok": null } },
                null
            ]
        });

        let parsed: RpcContextual<Vec<Option<RpcSignatureStatus>>> =
            serde_json::from_value(raw).unwrap();
        let statuses: Vec<_> = parsed
            .value
            .into_iter()
            .map(|s| s.map(RpcSignatureStatus::into_info))
            .collect();

        let first = statuses[0].as_ref().unwrap();
        assert_eq!(first.err, None);
        assert_eq!(first.confirmation_status, Some(ConfirmationLevel::Finalized));
        assert!(statuses[1].is_none());
    }
}
