//! External collaborators of the gateway: where endpoints and limits come
//! from, and where the signing key comes from.

pub mod config_source;
pub mod key_provider;

pub use config_source::{
    merge_endpoints, CachedConfigSource, ConfigSnapshot, ConfigSource, EndpointsFile,
    FileConfigSource, StaticConfigSource, DEFAULT_CONFIG_TTL,
};
pub use key_provider::{CachedKeyProvider, FileKeyProvider, KeyProvider, StaticKeyProvider};
