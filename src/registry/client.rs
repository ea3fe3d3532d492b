// This file contains the RegistryClient, which owns the connection-level
// state for one registry: base URL, default headers and the transport.
// Protocol operations live in `registry::operations` as further impl blocks.

use crate::config::{AuthConfig, ClientConfig};
use crate::error::{Phase, RegistryError, Result};
use crate::logging::Logger;
use crate::registry::transport::{HttpTransport, RegistryTransport, TransportRequest, TransportResponse};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use reqwest::Method;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use std::sync::Arc;
use url::Url;

pub struct RegistryClientBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn RegistryTransport>>,
    output: Logger,
}

impl RegistryClientBuilder {
    pub fn new(registry: &str) -> Self {
        Self::from_config(&ClientConfig::new(registry))
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            config: config.clone(),
            transport: None,
            output: Logger::default(),
        }
    }

    /// Replace the reqwest transport, e.g. with a scripted one in tests
    pub fn with_transport(mut self, transport: Arc<dyn RegistryTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_default_chunk_size(mut self, chunk_size: u64) -> Self {
        self.config.default_chunk_size = chunk_size;
        self
    }

    pub fn with_user_agent(mut self, user_agent: &str) -> Self {
        self.config.user_agent = user_agent.to_string();
        self
    }

    pub fn with_auth(mut self, auth: AuthConfig) -> Self {
        self.config.auth = auth;
        self
    }

    pub fn with_skip_tls(mut self, skip_tls: bool) -> Self {
        self.config.skip_tls = skip_tls;
        self
    }

    pub fn with_logger(mut self, output: Logger) -> Self {
        self.output = output;
        self
    }

    pub fn build(self) -> Result<RegistryClient> {
        self.config.validate()?;
        let base = self.config.base_url()?;

        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::from_config(&self.config)?),
        };

        let mut default_headers = HeaderMap::new();
        default_headers.insert(USER_AGENT, header_value(&self.config.user_agent)?);

        let client = RegistryClient {
            transport,
            base,
            default_headers,
            default_chunk_size: self.config.default_chunk_size,
            output: self.output,
        };

        let auth = &self.config.auth;
        if let Some(token) = &auth.token {
            client.with_bearer_token(token)
        } else if let (Some(username), Some(password)) = (&auth.username, &auth.password) {
            client.with_basic_auth(username, password)
        } else {
            Ok(client)
        }
    }
}

/// Client for one registry
///
/// Cloning is cheap and clones share the transport. Authentication methods
/// return a new client, so a value in use by concurrent operations never
/// changes its headers.
#[derive(Clone)]
pub struct RegistryClient {
    transport: Arc<dyn RegistryTransport>,
    base: Url,
    default_headers: HeaderMap,
    default_chunk_size: u64,
    pub(crate) output: Logger,
}

impl std::fmt::Debug for RegistryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryClient")
            .field("base", &self.base.as_str())
            .field("default_chunk_size", &self.default_chunk_size)
            .field("authenticated", &self.default_headers.contains_key(AUTHORIZATION))
            .finish()
    }
}

impl RegistryClient {
    /// Client with the reqwest transport and default settings
    pub fn new(registry: &str) -> Result<Self> {
        Self::builder(registry).build()
    }

    pub fn builder(registry: &str) -> RegistryClientBuilder {
        RegistryClientBuilder::new(registry)
    }

    /// Copy of this client that sends `Authorization: Bearer base64(username:password)`
    pub fn with_basic_auth(&self, username: &str, password: &str) -> Result<Self> {
        let token = STANDARD.encode(format!("{}:{}", username, password));
        self.with_bearer_token(&token)
    }

    /// Copy of this client that sends `Authorization: Bearer <token>`
    pub fn with_bearer_token(&self, token: &str) -> Result<Self> {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| RegistryError::validation("token", "<redacted>", "is not a valid header value"))?;
        value.set_sensitive(true);

        let mut client = self.clone();
        client.default_headers.insert(AUTHORIZATION, value);
        Ok(client)
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    pub fn default_headers(&self) -> &HeaderMap {
        &self.default_headers
    }

    pub fn default_chunk_size(&self) -> u64 {
        self.default_chunk_size
    }

    /// `<base>/v2/<path>`, keeping any path prefix of the base URL
    pub(crate) fn v2_url(&self, path: &str) -> Result<Url> {
        let base = self.base.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{}/v2/{}", base, path))?)
    }

    /// Send one request with the default headers merged under `headers`
    pub async fn request(
        &self,
        method: Method,
        url: Url,
        headers: HeaderMap,
        body: Option<Bytes>,
    ) -> Result<TransportResponse> {
        let mut request = TransportRequest::new(method, url)
            .with_headers(merge_headers(&self.default_headers, headers));
        request.body = body;

        tracing::debug!(method = %request.method, url = %request.url, "registry request");
        self.transport.send(request).await
    }

    /// Absolute URL for a `Location` header value
    ///
    /// Registries may answer with an absolute URL or a path; paths are
    /// resolved against the registry base.
    pub fn resolve_location(&self, location: Option<&str>, phase: Phase, status: u16) -> Result<Url> {
        let location = location
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| RegistryError::missing_location(phase, status))?;

        self.base.join(location).map_err(|e| {
            RegistryError::protocol(
                phase,
                Some(status),
                format!("Location header '{}' is not a valid URI: {}", location, e),
            )
        })
    }
}

/// Merge per-call headers over the defaults
///
/// A per-call header replaces every default value of the same name; multiple
/// per-call values for one name (such as `Accept`) are all kept.
pub fn merge_headers(defaults: &HeaderMap, overrides: HeaderMap) -> HeaderMap {
    let mut merged = defaults.clone();
    for name in overrides.keys() {
        merged.remove(name);
    }
    for (name, value) in overrides.iter() {
        merged.append(name.clone(), value.clone());
    }
    merged
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| RegistryError::validation("header", value, "is not a valid header value"))
}
