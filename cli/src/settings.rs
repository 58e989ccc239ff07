//! Settings file shared by every subcommand.
//!
//! One YAML file carries both the endpoint list (read by the gateway's
//! `FileConfigSource` on every initialization) and the local gateway
//! settings below. Each reader ignores the other's keys.
//!
//! ```yaml
//! primary_url: https://my-node.example.com
//! endpoints:
//!   - { url: https://rpc-a.example.com, priority: 1, name: a }
//! read_limit: 10
//! write_limit: 5
//! fallback_url: https://api.mainnet-beta.solana.com
//! keypair: ~/.config/solana/id.json
//! redis:
//!   url: redis://127.0.0.1:6379
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use ledger_gateway_client::{
    CachedConfigSource, CachedKeyProvider, FileConfigSource, FileKeyProvider, GatewayConfig,
    GatewayConfigBuilder, KeyProvider, LedgerGateway, RateLimitBackend, RateLimitConfig,
    DEFAULT_CONFIG_TTL,
};
use serde::Deserialize;
use solana_sdk::pubkey::Pubkey;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub fallback_url: Option<String>,
    /// Mints reported by `balance`, base58
    pub tracked_mints: Option<Vec<String>>,
    pub keypair: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub max_concurrent_reads: Option<usize>,
    pub max_concurrent_writes: Option<usize>,
    /// How long fetched endpoints and limits are reused
    pub config_ttl_secs: Option<u64>,
    pub redis: Option<RedisSettings>,
}

#[derive(Debug, Deserialize)]
pub struct RedisSettings {
    pub url: String,
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

fn default_key_prefix() -> String {
    "ledger-gateway".to_string()
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    pub fn gateway_config(&self) -> Result<GatewayConfig> {
        let mut builder = GatewayConfigBuilder::new();
        if let Some(url) = &self.fallback_url {
            builder = builder.fallback_url(url.clone());
        }
        if let Some(secs) = self.request_timeout_secs {
            builder = builder.request_timeout(Duration::from_secs(secs));
        }
        if let Some(mints) = &self.tracked_mints {
            let mints = mints
                .iter()
                .map(|m| {
                    m.parse::<Pubkey>()
                        .with_context(|| format!("Invalid tracked mint: {}", m))
                })
                .collect::<Result<Vec<_>>>()?;
            builder = builder.tracked_mints(mints);
        }

        let defaults = RateLimitConfig::default();
        builder = builder.rate_limit(RateLimitConfig {
            max_concurrent_reads: self
                .max_concurrent_reads
                .unwrap_or(defaults.max_concurrent_reads),
            max_concurrent_writes: self
                .max_concurrent_writes
                .unwrap_or(defaults.max_concurrent_writes),
            backend: match &self.redis {
                Some(redis) => RateLimitBackend::Redis {
                    url: redis.url.clone(),
                    key_prefix: redis.key_prefix.clone(),
                },
                None => RateLimitBackend::InProcess,
            },
            ..defaults
        });

        builder.build().context("Invalid gateway settings")
    }

    /// Keypair path: command line, then settings, then the Solana CLI default.
    pub fn keypair_path(&self, cli_override: Option<PathBuf>) -> PathBuf {
        if let Some(path) = cli_override {
            return path;
        }
        if let Some(path) = &self.keypair {
            return PathBuf::from(shellexpand::tilde(path).into_owned());
        }
        dirs::home_dir()
            .map(|home| home.join(".config").join("solana").join("id.json"))
            .unwrap_or_else(|| PathBuf::from("id.json"))
    }
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ledger-gateway")
        .join("config.yaml")
}

/// A gateway together with the key provider it signs with.
pub struct Session {
    pub gateway: LedgerGateway,
    pub keys: Arc<dyn KeyProvider>,
}

impl Session {
    pub fn open(config_path: &Path, keypair: Option<PathBuf>) -> Result<Self> {
        let settings = Settings::load(config_path)?;
        let config = settings.gateway_config()?;

        let ttl = settings
            .config_ttl_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_CONFIG_TTL);
        let source = CachedConfigSource::with_ttl(FileConfigSource::new(config_path), ttl);
        let keys: Arc<dyn KeyProvider> = Arc::new(CachedKeyProvider::new(FileKeyProvider::new(
            settings.keypair_path(keypair),
        )));

        Ok(Self {
            gateway: LedgerGateway::new(config, Arc::new(source), keys.clone()),
            keys,
        })
    }

    /// Public key of the configured signer.
    pub async fn signer(&self) -> Result<Pubkey> {
        use solana_sdk::signature::Signer;

        let keypair = self
            .keys
            .get_keypair()
            .await
            .context("Failed to load signer keypair")?;
        Ok(keypair.pubkey())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_settings_with_endpoint_keys() {
        let yaml = r#"
primary_url: https://primary.example.com
endpoints:
  - { url: https://a.example.com, priority: 1, name: a }
fallback_url: http://localhost:8899
tracked_mints:
  - EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v
redis:
  url: redis://127.0.0.1:6379
"#;
        let settings: Settings = serde_yaml::from_str(yaml).unwrap();
        let config = settings.gateway_config().unwrap();

        assert_eq!(config.fallback_url, "http://localhost:8899");
        assert_eq!(config.tracked_mints.len(), 1);
        assert_eq!(
            config.rate_limit.backend,
            RateLimitBackend::Redis {
                url: "redis://127.0.0.1:6379".into(),
                key_prefix: "ledger-gateway".into(),
            }
        );
    }

    #[test]
    fn test_bad_mint_is_rejected() {
        let settings = Settings {
            tracked_mints: Some(vec!["not-a-key".into()]),
            ..Default::default()
        };
        assert!(settings.gateway_config().is_err());
    }

    #[test]
    fn test_keypair_override_wins() {
        let settings = Settings {
            keypair: Some("/etc/keys/signer.json".into()),
            ..Default::default()
        };
        assert_eq!(
            settings.keypair_path(Some(PathBuf::from("/tmp/k.json"))),
            PathBuf::from("/tmp/k.json")
        );
        assert_eq!(settings.keypair_path(None), PathBuf::from("/etc/keys/signer.json"));
    }
}
