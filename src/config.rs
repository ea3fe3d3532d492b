//! Configuration module for registry connection settings

use crate::error::{RegistryError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use url::Url;

/// Chunk size used when the registry does not ask for a larger one
pub const DEFAULT_CHUNK_SIZE: u64 = 1024;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    pub username: Option<String>,
    pub password: Option<String>,
    /// Pre-issued bearer token, used as-is
    pub token: Option<String>,
}

impl AuthConfig {
    pub fn has_credentials(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Registry base URL, e.g. `https://ghcr.io`
    pub registry: String,
    pub default_chunk_size: u64,
    pub user_agent: String,
    pub skip_tls: bool,
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub auth: AuthConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            registry: String::new(),
            default_chunk_size: DEFAULT_CHUNK_SIZE,
            user_agent: format!("oci-transfer/{}", env!("CARGO_PKG_VERSION")),
            skip_tls: false,
            timeout_secs: None,
            auth: AuthConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn new(registry: &str) -> Self {
        Self {
            registry: registry.to_string(),
            ..Default::default()
        }
    }

    /// Load settings from `OCI_*` environment variables
    pub fn from_env() -> Result<Self> {
        let registry = env::var("OCI_REGISTRY")
            .map_err(|_| RegistryError::Config("OCI_REGISTRY not set".to_string()))?;

        let mut config = Self::new(&registry);
        config.auth = AuthConfig {
            username: env::var("OCI_USERNAME").ok(),
            password: env::var("OCI_PASSWORD").ok(),
            token: env::var("OCI_TOKEN").ok(),
        };
        config.skip_tls = env::var("OCI_SKIP_TLS").is_ok_and(|v| v == "true");

        if let Ok(value) = env::var("OCI_CHUNK_SIZE") {
            config.default_chunk_size = value.parse().map_err(|_| {
                RegistryError::Config(format!("OCI_CHUNK_SIZE is not a number: {}", value))
            })?;
        }
        if let Ok(value) = env::var("OCI_TIMEOUT_SECS") {
            config.timeout_secs = Some(value.parse().map_err(|_| {
                RegistryError::Config(format!("OCI_TIMEOUT_SECS is not a number: {}", value))
            })?);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_chunk_size == 0 {
            return Err(RegistryError::Config(
                "default chunk size must be greater than 0".to_string(),
            ));
        }
        self.base_url()?;
        Ok(())
    }

    pub fn base_url(&self) -> Result<Url> {
        let url = Url::parse(&self.registry)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(RegistryError::Config(format!(
                "registry URL must use http or https: {}",
                self.registry
            )));
        }
        Ok(url)
    }
}
