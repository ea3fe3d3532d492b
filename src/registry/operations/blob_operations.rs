//! Blob operations for registry client
//!
//! Implements OCI Distribution blob endpoints:
//! - Blob existence checks (HEAD /v2/{name}/blobs/{digest})
//! - Blob download (GET /v2/{name}/blobs/{digest}) as a lazy byte stream
//! - Chunked blob upload (POST /v2/{name}/blobs/uploads/, PATCH loop, PUT ?digest=)
//!
//! Nothing here retries. Every push opens a new upload session.

use crate::digest::{ContentDigest, ContentHasher};
use crate::error::handlers::HttpErrorHandler;
use crate::error::{Phase, RegistryError, Result};
use crate::image::descriptor::Descriptor;
use crate::registry::client::RegistryClient;
use crate::registry::reference::validate_name;
use crate::registry::transport::{BlobStream, TransportResponse};
use crate::upload::chunked::{ChunkWindow, UploadSession};
use bytes::{Bytes, BytesMut};
use futures::stream::{self, StreamExt};
use reqwest::header::{CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode};
use url::Url;

pub const CHUNK_MIN_LENGTH_HEADER: &str = "OCI-Chunk-Min-Length";

/// Result of a completed blob push
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushedBlob {
    pub digest: ContentDigest,
    pub size: u64,
    /// Where the registry says the blob can be fetched, when it says so
    pub location: Option<Url>,
}

impl RegistryClient {
    /// Check whether the registry already stores `digest` under `name`
    pub async fn blob_exists(&self, name: &str, digest: &ContentDigest) -> Result<bool> {
        validate_name(name)?;
        self.head_blob(name, digest)
            .await
            .map_err(|e| e.with_target(name, &digest.to_string()))
    }

    /// Stream the blob `digest` from repository `name`
    ///
    /// The stream is finite and cannot be restarted without calling this again.
    /// Its content is not verified; see [`fetch_blob_verified`](Self::fetch_blob_verified).
    pub async fn fetch_blob(&self, name: &str, digest: &ContentDigest) -> Result<BlobStream> {
        validate_name(name)?;
        self.open_blob(name, digest)
            .await
            .map_err(|e| e.with_target(name, &digest.to_string()))
    }

    /// Download the blob `descriptor` points at and check its size and digest
    pub async fn fetch_blob_verified(&self, name: &str, descriptor: &Descriptor) -> Result<Bytes> {
        let mut body = self.fetch_blob(name, &descriptor.digest).await?;
        let mut hasher = ContentHasher::new();
        let mut buffer = BytesMut::with_capacity(descriptor.size.min(64 * 1024 * 1024) as usize);

        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            hasher.update(&chunk);
            buffer.extend_from_slice(&chunk);
            if hasher.len() > descriptor.size {
                break;
            }
        }

        if let Err(err) = hasher.verify(descriptor) {
            self.output
                .warning(&format!("Blob {} failed verification: {}", descriptor.digest.short(), err));
            return Err(err);
        }

        self.output.detail(&format!(
            "Blob {} verified ({})",
            descriptor.digest.short(),
            self.output.format_size(descriptor.size)
        ));
        Ok(buffer.freeze())
    }

    /// Upload `data` to repository `name` through a new chunked upload session
    pub async fn push_blob(&self, name: &str, data: impl Into<Bytes>) -> Result<PushedBlob> {
        validate_name(name)?;
        let data: Bytes = data.into();
        let digest = ContentDigest::of(&data);
        self.upload_blob(name, data, &digest)
            .await
            .map_err(|e| e.with_target(name, &digest.to_string()))
    }

    async fn head_blob(&self, name: &str, digest: &ContentDigest) -> Result<bool> {
        let url = self.v2_url(&format!("{}/blobs/{}", name, digest))?;

        let response = self.request(Method::HEAD, url, HeaderMap::new(), None).await?;
        match response.status {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(unexpected(Phase::BlobExists, status, response).await),
        }
    }

    async fn open_blob(&self, name: &str, digest: &ContentDigest) -> Result<BlobStream> {
        let url = self.v2_url(&format!("{}/blobs/{}", name, digest))?;

        let response = self.request(Method::GET, url, HeaderMap::new(), None).await?;
        if response.status != StatusCode::OK {
            let status = response.status;
            return Err(unexpected(Phase::FetchBlob, status, response).await);
        }

        let mut body = response.body;
        loop {
            match body.next().await {
                Some(Ok(chunk)) if chunk.is_empty() => continue,
                Some(Ok(first)) => {
                    tracing::debug!(name, digest = %digest, "blob stream opened");
                    let head = stream::once(async move { Ok::<_, RegistryError>(first) });
                    return Ok(head.chain(body).boxed());
                }
                Some(Err(err)) => return Err(err),
                None => {
                    return Err(RegistryError::protocol(
                        Phase::FetchBlob,
                        Some(StatusCode::OK.as_u16()),
                        "empty body for blob",
                    ));
                }
            }
        }
    }

    async fn upload_blob(&self, name: &str, data: Bytes, digest: &ContentDigest) -> Result<PushedBlob> {
        let size = data.len() as u64;

        let mut session = UploadSession::new(self.default_chunk_size());
        let (location, min_chunk_size) = self.start_upload_session(name).await?;
        session.start(location, min_chunk_size)?;

        self.output.detail(&format!(
            "Uploading blob {} ({}) in chunks of {}",
            digest.short(),
            self.output.format_size(size),
            self.output.format_size(session.chunk_size())
        ));

        while let Some(window) = session.next_window(size) {
            let current = session
                .location()
                .cloned()
                .ok_or_else(|| RegistryError::protocol(Phase::UploadChunk, None, "upload session has no location"))?;
            let next = self
                .upload_chunk(&current, window, data.slice(window.range()))
                .await?;
            session.record_chunk(window, next)?;
        }

        let finalize_url = session.finalize_url(digest)?;
        let location = self.finalize_upload(finalize_url).await?;
        session.finish(digest.clone())?;

        self.output.success(&format!("Blob {} uploaded", digest.short()));
        Ok(PushedBlob {
            digest: digest.clone(),
            size,
            location,
        })
    }

    async fn start_upload_session(&self, name: &str) -> Result<(Url, u64)> {
        let url = self.v2_url(&format!("{}/blobs/uploads/", name))?;
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("0"));

        let response = self
            .request(Method::POST, url, headers, Some(Bytes::new()))
            .await?;
        let status = response.status;
        if !status.is_success() {
            return Err(unexpected(Phase::StartSession, status, response).await);
        }

        let location = self.resolve_location(response.header("Location"), Phase::StartSession, status.as_u16())?;
        let min_chunk_size = match response.header(CHUNK_MIN_LENGTH_HEADER) {
            Some(value) => value.trim().parse::<u64>().map_err(|_| {
                RegistryError::protocol(
                    Phase::StartSession,
                    Some(status.as_u16()),
                    format!("invalid {} header: {}", CHUNK_MIN_LENGTH_HEADER, value),
                )
            })?,
            None => 0,
        };

        tracing::debug!(name, location = %location, min_chunk_size, "upload session started");
        Ok((location, min_chunk_size))
    }

    async fn upload_chunk(&self, location: &Url, window: ChunkWindow, chunk: Bytes) -> Result<Url> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/octet-stream"));
        headers.insert(CONTENT_LENGTH, HeaderValue::from(chunk.len() as u64));
        // a zero-length chunk has no byte range to declare
        if let Some(range) = window.content_range() {
            headers.insert(CONTENT_RANGE, range_header(&range)?);
        }

        let response = self
            .request(Method::PATCH, location.clone(), headers, Some(chunk))
            .await?;
        let status = response.status;
        if !status.is_success() {
            return Err(unexpected(Phase::UploadChunk, status, response).await);
        }

        tracing::debug!(offset = window.start, len = window.len(), "chunk accepted");
        self.resolve_location(response.header("Location"), Phase::UploadChunk, status.as_u16())
    }

    async fn finalize_upload(&self, url: Url) -> Result<Option<Url>> {
        let response = self.request(Method::PUT, url, HeaderMap::new(), None).await?;
        let status = response.status;
        if !status.is_success() {
            return Err(unexpected(Phase::FinalizeUpload, status, response).await);
        }

        match response.header("Location") {
            Some(value) => self
                .resolve_location(Some(value), Phase::FinalizeUpload, status.as_u16())
                .map(Some),
            None => Ok(None),
        }
    }
}

fn range_header(range: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(range).map_err(|_| {
        RegistryError::protocol(Phase::UploadChunk, None, "unrepresentable Content-Range")
    })
}

/// Protocol error for `status`, carrying whatever error body the registry sent
pub(crate) async fn unexpected(phase: Phase, status: StatusCode, response: TransportResponse) -> RegistryError {
    let body = response.text().await.unwrap_or_default();
    HttpErrorHandler::unexpected_status(phase, status, &body)
}
