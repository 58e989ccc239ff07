//! Main LedgerGateway implementation.
//!
//! The gateway owns everything built from one config snapshot (endpoint
//! health, raw and rate-limited clients, the shared limiter and the retry
//! executor) in a [`GatewayRuntime`]. The runtime is built lazily, once per
//! initialization epoch, and shared by every caller of that epoch.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use solana_sdk::{commitment_config::CommitmentConfig, pubkey::Pubkey};
use tokio::sync::OnceCell;

use crate::{
    config::GatewayConfig,
    confirmation::ConfirmationPoller,
    errors::GatewayResult,
    ledger::{LedgerClient, LedgerClientFactory, SolanaClientFactory},
    providers::{ConfigSnapshot, ConfigSource, KeyProvider},
    rpc::{EndpointManager, RateLimitedClient, RetryExecutor, RpcRateLimiter},
    types::Endpoint,
};

/// Everything built from one config snapshot.
pub struct GatewayRuntime {
    pub(crate) epoch: u64,
    pub(crate) degraded: bool,
    pub(crate) endpoints: Arc<EndpointManager>,
    /// Raw clients in endpoint list order.
    pub(crate) raw_clients: Vec<Arc<dyn LedgerClient>>,
    pub(crate) fallback_raw: Arc<dyn LedgerClient>,
    pub(crate) limiter: Arc<RpcRateLimiter>,
    pub(crate) executor: RetryExecutor,
}

impl GatewayRuntime {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn endpoints(&self) -> &Arc<EndpointManager> {
        &self.endpoints
    }

    pub fn limiter(&self) -> &Arc<RpcRateLimiter> {
        &self.limiter
    }

    pub fn executor(&self) -> &RetryExecutor {
        &self.executor
    }

    /// Raw clients of every endpoint followed by the fallback, each URL once.
    pub fn raw_clients_with_fallback(&self) -> Vec<Arc<dyn LedgerClient>> {
        let mut clients = self.raw_clients.clone();
        if !clients.iter().any(|c| c.url() == self.fallback_raw.url()) {
            clients.push(self.fallback_raw.clone());
        }
        clients
    }
}

/// Single-assignment slot of one initialization epoch.
struct EpochCell {
    epoch: u64,
    runtime: OnceCell<Arc<GatewayRuntime>>,
}

impl EpochCell {
    fn new(epoch: u64) -> Arc<Self> {
        Arc::new(Self {
            epoch,
            runtime: OnceCell::new(),
        })
    }
}

/// Resilient client for a Solana ledger spread over several RPC endpoints.
///
/// Provides:
/// - Priority endpoint selection with failover and cooldown
/// - Separate read and write rate limits shared by all endpoints
/// - Retry across endpoints with a last-resort fallback endpoint
/// - Cross-endpoint transaction confirmation polling
///
/// # Example
///
/// ```ignore
/// use ledger_gateway_client::{LedgerGateway, LedgerReadApi, GatewayConfig};
///
/// let gateway = LedgerGateway::new(GatewayConfig::default(), config_source, key_provider);
/// let balance = gateway.get_balance(&address).await?;
/// println!("{} SOL", balance.sol);
/// ```
pub struct LedgerGateway {
    pub(crate) config: GatewayConfig,
    config_source: Arc<dyn ConfigSource>,
    pub(crate) key_provider: Arc<dyn KeyProvider>,
    factory: Arc<dyn LedgerClientFactory>,
    state: RwLock<Arc<EpochCell>>,
    /// Decimals of mints already looked up
    pub(crate) decimals_cache: tokio::sync::RwLock<HashMap<Pubkey, u8>>,
}

impl LedgerGateway {
    /// Create a gateway talking to Solana RPC endpoints.
    pub fn new(
        config: GatewayConfig,
        config_source: Arc<dyn ConfigSource>,
        key_provider: Arc<dyn KeyProvider>,
    ) -> Self {
        let factory = SolanaClientFactory::new(config.request_timeout, CommitmentConfig::confirmed());
        Self::with_factory(config, config_source, key_provider, Arc::new(factory))
    }

    /// Create a gateway with a custom client factory.
    pub fn with_factory(
        config: GatewayConfig,
        config_source: Arc<dyn ConfigSource>,
        key_provider: Arc<dyn KeyProvider>,
        factory: Arc<dyn LedgerClientFactory>,
    ) -> Self {
        Self {
            config,
            config_source,
            key_provider,
            factory,
            state: RwLock::new(EpochCell::new(0)),
            decimals_cache: tokio::sync::RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Initialize eagerly. Later calls return immediately.
    pub async fn initialize(&self) {
        self.runtime().await;
    }

    /// The runtime of the current epoch, building it on first use.
    ///
    /// Concurrent callers of one epoch await the same build.
    pub async fn runtime(&self) -> Arc<GatewayRuntime> {
        let cell = self
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        cell.runtime
            .get_or_init(|| self.build_runtime(cell.epoch))
            .await
            .clone()
    }

    /// Start a new epoch: fetch config again and rebuild clients and health.
    pub async fn reinitialize(&self) {
        {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            let next = state.epoch + 1;
            *state = EpochCell::new(next);
        }
        self.initialize().await;
    }

    /// Retry executor of the current epoch.
    pub async fn executor(&self) -> RetryExecutor {
        self.runtime().await.executor.clone()
    }

    /// Rate-limited client of the preferred endpoint, or of the fallback
    /// when no endpoint is selectable.
    pub async fn get_connection(&self) -> Arc<dyn LedgerClient> {
        let runtime = self.runtime().await;
        runtime
            .endpoints
            .next_endpoint()
            .and_then(|endpoint| runtime.executor.client_for(&endpoint.url))
            .unwrap_or_else(|| runtime.executor.fallback().clone())
    }

    /// Poller over the raw clients of the current epoch.
    pub async fn confirmation_poller(&self) -> ConfirmationPoller {
        let runtime = self.runtime().await;
        ConfirmationPoller::new(
            runtime.raw_clients_with_fallback(),
            self.config.confirmation.clone(),
        )
    }

    /// Drop the cached signing key.
    pub async fn refresh_wallet(&self) -> GatewayResult<()> {
        self.key_provider.refresh().await
    }

    async fn build_runtime(&self, epoch: u64) -> Arc<GatewayRuntime> {
        match ConfigSnapshot::fetch(self.config_source.as_ref()).await {
            Ok(snapshot) => {
                let limiter = RpcRateLimiter::connect(snapshot.limits, &self.config.rate_limit).await;
                tracing::info!(
                    epoch = epoch,
                    endpoints = snapshot.endpoints.len(),
                    read_limit = snapshot.limits.read_limit,
                    write_limit = snapshot.limits.write_limit,
                    "Gateway initialized"
                );
                Arc::new(self.assemble(epoch, snapshot.endpoints, Arc::new(limiter), false))
            }
            Err(e) => {
                tracing::warn!(
                    epoch = epoch,
                    error = %e,
                    fallback = %self.config.fallback_url,
                    "Gateway initialization failed, using fallback endpoint only"
                );
                let endpoints = vec![Endpoint::new(self.config.fallback_url.clone(), 0, "fallback")];
                Arc::new(self.assemble(
                    epoch,
                    endpoints,
                    Arc::new(RpcRateLimiter::unlimited()),
                    true,
                ))
            }
        }
    }

    fn assemble(
        &self,
        epoch: u64,
        endpoints: Vec<Endpoint>,
        limiter: Arc<RpcRateLimiter>,
        degraded: bool,
    ) -> GatewayRuntime {
        let manager = Arc::new(EndpointManager::new(endpoints, self.config.health.clone()));

        let mut raw_clients = Vec::new();
        let mut limited: HashMap<String, Arc<dyn LedgerClient>> = HashMap::new();
        for endpoint in manager.endpoints() {
            let raw = self.factory.create(&endpoint.url);
            limited.insert(
                endpoint.url.clone(),
                Arc::new(RateLimitedClient::new(raw.clone(), limiter.clone())),
            );
            raw_clients.push(raw);
        }

        let fallback_raw = raw_clients
            .iter()
            .find(|c| c.url() == self.config.fallback_url)
            .cloned()
            .unwrap_or_else(|| self.factory.create(&self.config.fallback_url));
        let fallback: Arc<dyn LedgerClient> =
            Arc::new(RateLimitedClient::new(fallback_raw.clone(), limiter.clone()));

        let executor = RetryExecutor::new(
            self.config.retry.clone(),
            manager.clone(),
            Arc::new(limited),
            fallback,
        );

        GatewayRuntime {
            epoch,
            degraded,
            endpoints: manager,
            raw_clients,
            fallback_raw,
            limiter,
            executor,
        }
    }
}
