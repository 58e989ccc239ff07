//! Signing key providers.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use solana_sdk::signature::{read_keypair_file, Keypair};
use tokio::sync::Mutex;

use crate::errors::{GatewayError, GatewayResult};

/// Supplies the signing keypair on demand.
#[async_trait]
pub trait KeyProvider: Send + Sync {
    async fn get_keypair(&self) -> GatewayResult<Arc<Keypair>>;

    /// Drop any cached key so the next call loads it again.
    async fn refresh(&self) -> GatewayResult<()> {
        Ok(())
    }
}

/// A keypair held in memory, or none at all.
pub struct StaticKeyProvider {
    keypair: Option<Arc<Keypair>>,
}

impl StaticKeyProvider {
    pub fn new(keypair: Keypair) -> Self {
        Self {
            keypair: Some(Arc::new(keypair)),
        }
    }

    /// A provider that always fails with [`GatewayError::WalletNotInitialized`].
    pub fn empty() -> Self {
        Self { keypair: None }
    }
}

#[async_trait]
impl KeyProvider for StaticKeyProvider {
    async fn get_keypair(&self) -> GatewayResult<Arc<Keypair>> {
        self.keypair.clone().ok_or(GatewayError::WalletNotInitialized)
    }
}

/// Reads a Solana JSON keypair file on every call.
#[derive(Debug, Clone)]
pub struct FileKeyProvider {
    path: PathBuf,
}

impl FileKeyProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl KeyProvider for FileKeyProvider {
    async fn get_keypair(&self) -> GatewayResult<Arc<Keypair>> {
        if !self.path.exists() {
            tracing::warn!(path = %self.path.display(), "Keypair file not found");
            return Err(GatewayError::WalletNotInitialized);
        }

        let path = self.path.clone();
        let keypair = tokio::task::spawn_blocking(move || {
            read_keypair_file(&path).map_err(|e| e.to_string())
        })
        .await
        .map_err(|e| GatewayError::Internal(e.into()))?
        .map_err(|e| GatewayError::InvalidConfig {
            message: format!("failed to read keypair {}: {}", self.path.display(), e),
        })?;
        Ok(Arc::new(keypair))
    }
}

/// Caches the inner provider's key for the life of the process.
pub struct CachedKeyProvider<P> {
    inner: P,
    cached: Mutex<Option<Arc<Keypair>>>,
}

impl<P: KeyProvider> CachedKeyProvider<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            cached: Mutex::new(None),
        }
    }
}

#[async_trait]
impl<P: KeyProvider> KeyProvider for CachedKeyProvider<P> {
    async fn get_keypair(&self) -> GatewayResult<Arc<Keypair>> {
        let mut cached = self.cached.lock().await;
        if let Some(keypair) = cached.as_ref() {
            return Ok(keypair.clone());
        }
        let keypair = self.inner.get_keypair().await?;
        *cached = Some(keypair.clone());
        Ok(keypair)
    }

    async fn refresh(&self) -> GatewayResult<()> {
        *self.cached.lock().await = None;
        self.inner.refresh().await?;
        tracing::info!("Signing key cache cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::signature::{write_keypair_file, Signer};
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingProvider {
        loads: AtomicU32,
    }

    #[async_trait]
    impl KeyProvider for CountingProvider {
        async fn get_keypair(&self) -> GatewayResult<Arc<Keypair>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(Keypair::new()))
        }
    }

    #[tokio::test]
    async fn test_empty_provider() {
        let err = StaticKeyProvider::empty().get_keypair().await.unwrap_err();
        assert!(matches!(err, GatewayError::WalletNotInitialized));
    }

    #[tokio::test]
    async fn test_cached_provider_loads_once_until_refresh() {
        let provider = CachedKeyProvider::new(CountingProvider {
            loads: AtomicU32::new(0),
        });

        let first = provider.get_keypair().await.unwrap();
        let second = provider.get_keypair().await.unwrap();
        assert_eq!(first.pubkey(), second.pubkey());
        assert_eq!(provider.inner.loads.load(Ordering::SeqCst), 1);

        provider.refresh().await.unwrap();
        let third = provider.get_keypair().await.unwrap();
        assert_ne!(first.pubkey(), third.pubkey());
        assert_eq!(provider.inner.loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_file_provider() {
        let path = std::env::temp_dir().join(format!("ledger-gateway-key-{}.json", std::process::id()));
        let keypair = Keypair::new();
        write_keypair_file(&keypair, &path).unwrap();

        let loaded = FileKeyProvider::new(&path).get_keypair().await.unwrap();
        assert_eq!(loaded.pubkey(), keypair.pubkey());
        std::fs::remove_file(&path).unwrap();

        let missing = FileKeyProvider::new(&path).get_keypair().await.unwrap_err();
        assert!(matches!(missing, GatewayError::WalletNotInitialized));
    }
}
