//! Endpoint and limiter diagnostics.

use solana_sdk::signature::Signature;

use crate::{
    errors::{GatewayError, GatewayResult},
    gateway::LedgerGateway,
    types::{Endpoint, EndpointHealth, EndpointStats, LimiterStatus, TransactionRecord},
};

impl LedgerGateway {
    /// Configured endpoints in list order, then the fallback.
    pub(crate) async fn get_all_rpc_endpoints_impl(&self) -> Vec<Endpoint> {
        let runtime = self.runtime().await;
        let mut endpoints = runtime.endpoints.endpoints();
        let fallback = runtime.executor.fallback().url();
        if !endpoints.iter().any(|e| e.url == fallback) {
            let priority = endpoints
                .iter()
                .map(|e| e.priority.saturating_add(1))
                .max()
                .unwrap_or(0);
            endpoints.push(Endpoint::new(fallback, priority, "fallback"));
        }
        endpoints
    }

    /// Ask one specific endpoint for a transaction, bypassing selection.
    pub(crate) async fn get_transaction_from_endpoint_impl(
        &self,
        signature: &Signature,
        url: &str,
    ) -> GatewayResult<Option<TransactionRecord>> {
        let runtime = self.runtime().await;
        let client = runtime
            .executor
            .client_for(url)
            .or_else(|| {
                let fallback = runtime.executor.fallback();
                (fallback.url() == url).then(|| fallback.clone())
            })
            .ok_or_else(|| GatewayError::InvalidInput(format!("unknown endpoint: {}", url)))?;

        client
            .get_parsed_transaction(signature)
            .await
            .map_err(|e| e.at_endpoint(url, 1))
    }

    pub(crate) async fn get_endpoint_health_impl(&self) -> Vec<EndpointHealth> {
        self.runtime().await.endpoints.health_status()
    }

    pub(crate) async fn get_endpoint_stats_impl(&self) -> EndpointStats {
        self.runtime().await.endpoints.stats()
    }

    pub(crate) async fn reset_endpoints_impl(&self) {
        self.runtime().await.endpoints.reset_all();
    }

    pub(crate) async fn get_limiter_status_impl(&self) -> LimiterStatus {
        self.runtime().await.limiter.status()
    }

    pub(crate) async fn is_degraded_impl(&self) -> bool {
        self.runtime().await.degraded
    }
}
