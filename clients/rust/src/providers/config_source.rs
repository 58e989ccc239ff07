//! Config sources supplying endpoints and rate limits.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::config::ConfigError;
use crate::errors::{GatewayError, GatewayResult};
use crate::types::{Endpoint, RateLimits};

/// How long [`CachedConfigSource`] keeps a fetched value by default.
pub const DEFAULT_CONFIG_TTL: Duration = Duration::from_secs(120);

/// Supplies the endpoint list and rate limits.
///
/// The gateway fetches both once per initialization epoch.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    async fn get_rate_limits(&self) -> GatewayResult<RateLimits>;

    async fn get_rpc_endpoints(&self) -> GatewayResult<Vec<Endpoint>>;
}

/// Endpoints and limits fetched for one initialization epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigSnapshot {
    pub endpoints: Vec<Endpoint>,
    pub limits: RateLimits,
}

impl ConfigSnapshot {
    /// Fetch both values from `source` and validate them.
    pub async fn fetch(source: &dyn ConfigSource) -> GatewayResult<Self> {
        let limits = source.get_rate_limits().await?;
        let endpoints = source.get_rpc_endpoints().await?;
        let snapshot = Self { endpoints, limits };
        snapshot.validate()?;
        Ok(snapshot)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoints.is_empty() {
            return Err(ConfigError::NoEndpoints);
        }
        for (i, endpoint) in self.endpoints.iter().enumerate() {
            if endpoint.url.trim().is_empty() {
                return Err(ConfigError::MissingField("url"));
            }
            if self.endpoints[..i].iter().any(|e| e.url == endpoint.url) {
                return Err(ConfigError::DuplicateEndpoint(endpoint.url.clone()));
            }
        }
        if self.limits.read_limit == 0 || self.limits.write_limit == 0 {
            return Err(ConfigError::InvalidRateLimits {
                read: self.limits.read_limit,
                write: self.limits.write_limit,
            });
        }
        Ok(())
    }
}

impl From<ConfigError> for GatewayError {
    fn from(e: ConfigError) -> Self {
        GatewayError::InvalidConfig {
            message: e.to_string(),
        }
    }
}

/// Combine a primary endpoint with endpoints from a secondary store.
///
/// The primary gets priority 0 and comes first. Stored endpoints keep their
/// own priority; the first occurrence of a URL wins.
pub fn merge_endpoints(primary: Option<&str>, stored: Vec<Endpoint>) -> Vec<Endpoint> {
    let mut merged: Vec<Endpoint> = Vec::with_capacity(stored.len() + 1);

    if let Some(url) = primary.map(str::trim).filter(|url| !url.is_empty()) {
        merged.push(Endpoint::new(url, 0, "primary"));
    }

    for endpoint in stored {
        if merged.iter().any(|e| e.url == endpoint.url) {
            continue;
        }
        merged.push(endpoint);
    }
    merged
}

/// Fixed endpoints and limits.
#[derive(Debug, Clone)]
pub struct StaticConfigSource {
    endpoints: Vec<Endpoint>,
    limits: RateLimits,
}

impl StaticConfigSource {
    pub fn new(endpoints: Vec<Endpoint>, limits: RateLimits) -> Self {
        Self { endpoints, limits }
    }
}

#[async_trait]
impl ConfigSource for StaticConfigSource {
    async fn get_rate_limits(&self) -> GatewayResult<RateLimits> {
        Ok(self.limits)
    }

    async fn get_rpc_endpoints(&self) -> GatewayResult<Vec<Endpoint>> {
        Ok(self.endpoints.clone())
    }
}

struct Cached<T> {
    value: T,
    fetched_at: Instant,
}

/// TTL cache in front of another source.
pub struct CachedConfigSource<S> {
    inner: S,
    ttl: Duration,
    limits: Mutex<Option<Cached<RateLimits>>>,
    endpoints: Mutex<Option<Cached<Vec<Endpoint>>>>,
}

impl<S: ConfigSource> CachedConfigSource<S> {
    pub fn new(inner: S) -> Self {
        Self::with_ttl(inner, DEFAULT_CONFIG_TTL)
    }

    pub fn with_ttl(inner: S, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            limits: Mutex::new(None),
            endpoints: Mutex::new(None),
        }
    }

    /// Drop cached values so the next call hits the inner source.
    pub async fn invalidate(&self) {
        *self.limits.lock().await = None;
        *self.endpoints.lock().await = None;
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn fresh<T: Clone>(&self, slot: &Option<Cached<T>>) -> Option<T> {
        slot.as_ref()
            .filter(|cached| cached.fetched_at.elapsed() < self.ttl)
            .map(|cached| cached.value.clone())
    }
}

#[async_trait]
impl<S: ConfigSource> ConfigSource for CachedConfigSource<S> {
    async fn get_rate_limits(&self) -> GatewayResult<RateLimits> {
        let mut slot = self.limits.lock().await;
        if let Some(value) = self.fresh(&slot) {
            return Ok(value);
        }
        let value = self.inner.get_rate_limits().await?;
        *slot = Some(Cached {
            value,
            fetched_at: Instant::now(),
        });
        Ok(value)
    }

    async fn get_rpc_endpoints(&self) -> GatewayResult<Vec<Endpoint>> {
        let mut slot = self.endpoints.lock().await;
        if let Some(value) = self.fresh(&slot) {
            return Ok(value);
        }
        let value = self.inner.get_rpc_endpoints().await?;
        *slot = Some(Cached {
            value: value.clone(),
            fetched_at: Instant::now(),
        });
        Ok(value)
    }
}

/// On-disk layout read by [`FileConfigSource`].
///
/// Unknown keys are ignored so the file can carry settings for other
/// consumers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointsFile {
    /// Primary endpoint, merged in at priority 0
    #[serde(default)]
    pub primary_url: Option<String>,
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
    #[serde(default = "default_read_limit")]
    pub read_limit: u32,
    #[serde(default = "default_write_limit")]
    pub write_limit: u32,
}

fn default_read_limit() -> u32 {
    RateLimits::default().read_limit
}

fn default_write_limit() -> u32 {
    RateLimits::default().write_limit
}

impl EndpointsFile {
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}

/// YAML file source, re-read on every call.
#[derive(Debug, Clone)]
pub struct FileConfigSource {
    path: PathBuf,
}

impl FileConfigSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> GatewayResult<EndpointsFile> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            GatewayError::InvalidConfig {
                message: format!("failed to read {}: {}", self.path.display(), e),
            }
        })?;
        Ok(EndpointsFile::parse(&content)?)
    }
}

#[async_trait]
impl ConfigSource for FileConfigSource {
    async fn get_rate_limits(&self) -> GatewayResult<RateLimits> {
        let file = self.load().await?;
        Ok(RateLimits {
            read_limit: file.read_limit,
            write_limit: file.write_limit,
        })
    }

    async fn get_rpc_endpoints(&self) -> GatewayResult<Vec<Endpoint>> {
        let file = self.load().await?;
        Ok(merge_endpoints(file.primary_url.as_deref(), file.endpoints))
    }
}
