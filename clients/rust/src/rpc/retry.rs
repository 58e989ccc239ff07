//! Retry across endpoints with exponential backoff and a last-resort
//! fallback.
//!
//! Each attempt asks the [`EndpointManager`] for the preferred selectable
//! endpoint and runs the operation against that endpoint's rate-limited
//! client. The endpoint used is carried through the attempt so success and
//! failure are always recorded against the endpoint that actually served it.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;

use super::endpoint_manager::EndpointManager;
use crate::config::RetryConfig;
use crate::errors::{GatewayError, GatewayResult};
use crate::ledger::LedgerClient;

/// Executor that retries ledger operations across endpoints.
#[derive(Clone)]
pub struct RetryExecutor {
    config: RetryConfig,
    endpoints: Arc<EndpointManager>,
    clients: Arc<HashMap<String, Arc<dyn LedgerClient>>>,
    fallback: Arc<dyn LedgerClient>,
}

impl RetryExecutor {
    /// Create an executor over `clients`, keyed by endpoint URL.
    pub fn new(
        config: RetryConfig,
        endpoints: Arc<EndpointManager>,
        clients: Arc<HashMap<String, Arc<dyn LedgerClient>>>,
        fallback: Arc<dyn LedgerClient>,
    ) -> Self {
        Self {
            config,
            endpoints,
            clients,
            fallback,
        }
    }

    /// Execute an operation with the configured number of attempts.
    pub async fn execute<F, Fut, T>(&self, operation: F) -> GatewayResult<T>
    where
        F: Fn(Arc<dyn LedgerClient>) -> Fut,
        Fut: Future<Output = GatewayResult<T>>,
    {
        self.execute_with_retries(operation, self.config.max_retries)
            .await
    }

    /// Execute an operation with up to `max_retries` endpoint attempts,
    /// then exactly one fallback attempt.
    ///
    /// Errors that are not endpoint failures are returned immediately
    /// and leave endpoint health untouched. When the fallback also fails,
    /// the last endpoint error is returned, or
    /// [`GatewayError::NoHealthyEndpoints`] when no endpoint could be
    /// selected at all.
    pub async fn execute_with_retries<F, Fut, T>(
        &self,
        operation: F,
        max_retries: u32,
    ) -> GatewayResult<T>
    where
        F: Fn(Arc<dyn LedgerClient>) -> Fut,
        Fut: Future<Output = GatewayResult<T>>,
    {
        let mut last_error: Option<GatewayError> = None;
        let mut attempts = 0;

        for attempt in 1..=max_retries {
            let Some(endpoint) = self.endpoints.next_endpoint() else {
                tracing::warn!(attempt = attempt, "No healthy endpoints, skipping to fallback");
                if last_error.is_none() {
                    last_error = Some(GatewayError::NoHealthyEndpoints);
                }
                break;
            };
            attempts = attempt;

            let client = self.clients.get(&endpoint.url).cloned().ok_or_else(|| {
                GatewayError::Internal(anyhow::anyhow!("no client for endpoint {}", endpoint.url))
            })?;

            match operation(client).await {
                Ok(result) => {
                    self.endpoints.mark_success(&endpoint.url);
                    return Ok(result);
                }
                Err(e) if !e.is_endpoint_failure() => return Err(e),
                Err(e) => {
                    self.endpoints.mark_failure(&endpoint.url, &e);
                    let delay = self.delay_after(attempt, &e);
                    let category = e.category();
                    let retryable = e.is_retryable();
                    last_error = Some(e.at_endpoint(endpoint.url.as_str(), attempt));

                    if attempt < max_retries {
                        tracing::debug!(
                            endpoint = %endpoint.url,
                            attempt = attempt,
                            category = %category,
                            retryable = retryable,
                            delay_ms = delay.as_millis() as u64,
                            "Retrying after error"
                        );
                        sleep(delay).await;
                    }
                }
            }
        }

        tracing::debug!(
            endpoint = %self.fallback.url(),
            attempts = attempts,
            "Trying fallback endpoint"
        );

        match operation(self.fallback.clone()).await {
            Ok(result) => Ok(result),
            Err(e) if !e.is_endpoint_failure() => Err(e),
            Err(e) => {
                tracing::warn!(
                    endpoint = %self.fallback.url(),
                    category = %e.category(),
                    error = %e,
                    "Fallback endpoint failed"
                );
                Err(last_error
                    .unwrap_or_else(|| e.at_endpoint(self.fallback.url(), attempts + 1)))
            }
        }
    }

    /// Backoff after failed attempt `attempt`, stretched to the endpoint's
    /// retry hint when it asks for longer, never beyond `max_delay_ms`.
    fn delay_after(&self, attempt: u32, error: &GatewayError) -> Duration {
        let backoff = self.config.backoff_delay(attempt);
        let max = Duration::from_millis(self.config.max_delay_ms);
        match error.retry_hint_ms() {
            Some(hint) => backoff.max(Duration::from_millis(hint)).min(max),
            None => backoff,
        }
    }

    pub fn endpoints(&self) -> &Arc<EndpointManager> {
        &self.endpoints
    }

    /// Rate-limited client of a configured endpoint.
    pub fn client_for(&self, url: &str) -> Option<Arc<dyn LedgerClient>> {
        self.clients.get(url).cloned()
    }

    pub fn fallback(&self) -> &Arc<dyn LedgerClient> {
        &self.fallback
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Get the maximum number of endpoint attempts.
    pub fn max_retries(&self) -> u32 {
        self.config.max_retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HealthConfig;
    use crate::types::{
        AccountSummary, Endpoint, SignatureStatusInfo, TokenAccountBalance, TokenAmount,
        TransactionRecord,
    };
    use async_trait::async_trait;
    use solana_sdk::{
        commitment_config::CommitmentConfig, hash::Hash, pubkey::Pubkey, signature::Signature,
        transaction::Transaction,
    };
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Answers `get_balance` with a fixed result and counts calls.
    struct FixedClient {
        url: String,
        balance: Option<u64>,
        calls: AtomicU32,
    }

    impl FixedClient {
        fn new(url: &str, balance: Option<u64>) -> Arc<Self> {
            Arc::new(Self {
                url: url.to_string(),
                balance,
                calls: AtomicU32::new(0),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    fn down() -> GatewayError {
        GatewayError::transport("connection refused")
    }

    #[async_trait]
    impl LedgerClient for FixedClient {
        fn url(&self) -> &str {
            &self.url
        }

        async fn get_balance(&self, _address: &Pubkey) -> GatewayResult<u64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.balance.ok_or_else(down)
        }

        async fn get_token_account_balance(&self, _: &Pubkey) -> GatewayResult<TokenAmount> {
            Err(down())
        }

        async fn get_parsed_token_accounts_by_owner(
            &self,
            _: &Pubkey,
            _: &Pubkey,
        ) -> GatewayResult<Vec<TokenAccountBalance>> {
            Err(down())
        }

        async fn get_token_supply(&self, _: &Pubkey) -> GatewayResult<TokenAmount> {
            Err(down())
        }

        async fn get_account_info(&self, _: &Pubkey) -> GatewayResult<Option<AccountSummary>> {
            Err(down())
        }

        async fn get_latest_blockhash(&self) -> GatewayResult<Hash> {
            Err(down())
        }

        async fn send_raw_transaction(&self, _: &Transaction) -> GatewayResult<Signature> {
            Err(down())
        }

        async fn confirm_transaction(&self, _: &Signature, _: CommitmentConfig) -> GatewayResult<bool> {
            Err(down())
        }

        async fn get_parsed_transaction(&self, _: &Signature) -> GatewayResult<Option<TransactionRecord>> {
            Err(down())
        }

        async fn get_signature_statuses(
            &self,
            _: &[Signature],
        ) -> GatewayResult<Vec<Option<SignatureStatusInfo>>> {
            Err(down())
        }
    }

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            max_retries: 3,
            initial_delay_ms: 1,
            max_delay_ms: 5,
            backoff_multiplier: 2.0,
            ..Default::default()
        }
    }

    fn executor(clients: &[(Arc<FixedClient>, u32)], fallback: Arc<FixedClient>) -> RetryExecutor {
        let endpoints = clients
            .iter()
            .map(|(c, p)| Endpoint::new(c.url.clone(), *p, c.url.clone()))
            .collect();
        let map: HashMap<String, Arc<dyn LedgerClient>> = clients
            .iter()
            .map(|(c, _)| (c.url.clone(), c.clone() as Arc<dyn LedgerClient>))
            .collect();
        RetryExecutor::new(
            fast_retry(),
            Arc::new(EndpointManager::new(endpoints, HealthConfig::default())),
            Arc::new(map),
            fallback,
        )
    }

    #[tokio::test]
    async fn test_success_on_primary() {
        let a = FixedClient::new("a", Some(5));
        let fallback = FixedClient::new("fallback", Some(0));
        let executor = executor(&[(a.clone(), 0)], fallback.clone());

        let balance = executor
            .execute(|client| async move { client.get_balance(&Pubkey::default()).await })
            .await
            .unwrap();

        assert_eq!(balance, 5);
        assert_eq!(a.calls(), 1);
        assert_eq!(fallback.calls(), 0);
        assert!(executor.endpoints().health_status()[0].last_success.is_some());
    }

    #[tokio::test]
    async fn test_failover_to_next_endpoint() {
        let a = FixedClient::new("a", None);
        let b = FixedClient::new("b", Some(9));
        let fallback = FixedClient::new("fallback", Some(0));
        let executor = executor(&[(a.clone(), 0), (b.clone(), 1)], fallback.clone());

        let balance = executor
            .execute(|client| async move { client.get_balance(&Pubkey::default()).await })
            .await
            .unwrap();

        assert_eq!(balance, 9);
        assert_eq!(a.calls(), 1);
        assert_eq!(b.calls(), 1);
        let health = executor.endpoints().health_status();
        assert_eq!(health[0].failure_count, 1);
        assert_eq!(health[1].failure_count, 0);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_last_endpoint_error() {
        let a = FixedClient::new("a", None);
        let b = FixedClient::new("b", None);
        let fallback = FixedClient::new("fallback", None);
        let executor = executor(&[(a.clone(), 0), (b.clone(), 1)], fallback.clone());

        let err = executor
            .execute(|client| async move { client.get_balance(&Pubkey::default()).await })
            .await
            .unwrap_err();

        assert_eq!(fallback.calls(), 1);
        match err {
            GatewayError::Endpoint { endpoint, .. } => assert_eq!(endpoint, "b"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_fallback_serves_when_endpoints_fail() {
        let a = FixedClient::new("a", None);
        let fallback = FixedClient::new("fallback", Some(3));
        let executor = executor(&[(a.clone(), 0)], fallback.clone());

        let balance = executor
            .execute(|client| async move { client.get_balance(&Pubkey::default()).await })
            .await
            .unwrap();

        assert_eq!(balance, 3);
        assert_eq!(fallback.calls(), 1);
    }

    #[tokio::test]
    async fn test_no_selectable_endpoint_with_failing_fallback() {
        let a = FixedClient::new("a", Some(1));
        let fallback = FixedClient::new("fallback", None);
        let executor = executor(&[(a.clone(), 0)], fallback.clone());
        for _ in 0..4 {
            executor.endpoints().mark_failure("a", &down());
        }

        let err = executor
            .execute(|client| async move { client.get_balance(&Pubkey::default()).await })
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::NoHealthyEndpoints));
        assert_eq!(a.calls(), 0);
        assert_eq!(fallback.calls(), 1);
    }

    #[tokio::test]
    async fn test_no_selectable_endpoint_fallback_serves() {
        let a = FixedClient::new("a", Some(1));
        let fallback = FixedClient::new("fallback", Some(2));
        let executor = executor(&[(a.clone(), 0)], fallback.clone());
        executor.endpoints().mark_failure("a", &down());

        let balance = executor
            .execute(|client| async move { client.get_balance(&Pubkey::default()).await })
            .await
            .unwrap();

        assert_eq!(balance, 2);
        assert_eq!(a.calls(), 0);
    }

    #[test]
    fn test_retry_hint_stretches_backoff_up_to_cap() {
        let fallback = FixedClient::new("fallback", None);
        let executor = executor(&[], fallback);

        assert_eq!(
            executor.delay_after(1, &GatewayError::RateLimited { retry_after_ms: 3 }),
            Duration::from_millis(3)
        );
        assert_eq!(
            executor.delay_after(1, &GatewayError::RateLimited { retry_after_ms: 500 }),
            Duration::from_millis(5)
        );
        assert_eq!(executor.delay_after(2, &down()), Duration::from_millis(2));
    }

    #[tokio::test]
    async fn test_business_error_not_retried() {
        let a = FixedClient::new("a", Some(1));
        let fallback = FixedClient::new("fallback", Some(1));
        let executor = executor(&[(a.clone(), 0)], fallback.clone());
        let attempts = AtomicU32::new(0);

        let result: GatewayResult<u64> = executor
            .execute(|_client| {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(GatewayError::InvalidAmount("0".into())) }
            })
            .await;

        assert!(matches!(result, Err(GatewayError::InvalidAmount(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(executor.endpoints().health_status()[0].failure_count, 0);
    }
}
