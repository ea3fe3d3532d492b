//! HTTP transport for OCI Distribution requests
//!
//! Every registry call goes through [`RegistryTransport::send`], one verb-agnostic
//! request/response exchange. [`HttpTransport`] is the reqwest-backed
//! implementation; tests substitute their own to script registry behaviour.

use crate::config::ClientConfig;
use crate::error::{RegistryError, Result};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use std::time::Duration;
use url::Url;

/// Lazily-read response body; finite and not restartable
pub type BlobStream = BoxStream<'static, Result<Bytes>>;

/// Registry transport operations
#[async_trait]
pub trait RegistryTransport: Send + Sync {
    /// Issue one request and return the response with an unread body
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse>;
}

/// A fully-resolved request
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl TransportRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// Response status, headers and a body that has not been read yet
pub struct TransportResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: BlobStream,
}

impl std::fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

impl TransportResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: BlobStream) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Response whose body is already in memory
    pub fn from_bytes(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        let body: Bytes = body.into();
        let stream: BlobStream = if body.is_empty() {
            stream::empty().boxed()
        } else {
            stream::once(async move { Ok::<_, RegistryError>(body) }).boxed()
        };
        Self::new(status, headers, stream)
    }

    /// Value of a header, if present and valid UTF-8
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Read the whole body
    pub async fn bytes(self) -> Result<Bytes> {
        let buffer = self
            .body
            .try_fold(BytesMut::new(), |mut acc, chunk| async move {
                acc.extend_from_slice(&chunk);
                Ok::<_, RegistryError>(acc)
            })
            .await?;
        Ok(buffer.freeze())
    }

    /// Read the whole body as text, replacing invalid UTF-8
    pub async fn text(self) -> Result<String> {
        let bytes = self.bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Reqwest-backed transport
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(Duration::from_secs(60));

        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        if config.skip_tls {
            builder = builder.danger_accept_invalid_certs(true);
        }

        Ok(Self::new(builder.build()?))
    }
}

#[async_trait]
impl RegistryTransport for HttpTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse> {
        let mut builder = self
            .client
            .request(request.method, request.url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes_stream()
            .map_err(RegistryError::Network)
            .boxed();

        Ok(TransportResponse::new(status, headers, body))
    }
}
