//! Manifest operations for registry client
//!
//! Implements OCI Distribution manifest endpoints:
//! - Manifest/index download (GET /v2/{name}/manifests/{reference})
//! - Manifest upload (PUT /v2/{name}/manifests/{reference})
//!
//! Index resolution is driven by the caller: an index is returned as such, and
//! the caller fetches again with the digest of the entry it wants.

use crate::digest::ContentDigest;
use crate::error::{Phase, RegistryError, Result};
use crate::image::descriptor::Descriptor;
use crate::image::manifest::{ImageIndex, ImageManifest, ManifestOrIndex};
use crate::image::media_type;
use crate::registry::client::RegistryClient;
use crate::registry::operations::blob_operations::unexpected;
use crate::registry::reference::{is_digest_reference, validate_name, validate_reference};
use bytes::Bytes;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode};
use url::Url;

/// Nested indexes followed by [`RegistryClient::resolve_manifest`] before giving up
pub const MAX_INDEX_DEPTH: usize = 8;

impl RegistryClient {
    /// Fetch whatever `reference` (a tag or a digest) points at in repository `name`
    pub async fn fetch_manifest_or_index(&self, name: &str, reference: &str) -> Result<ManifestOrIndex> {
        validate_name(name)?;
        validate_reference(reference)?;
        self.get_manifest(name, reference)
            .await
            .map_err(|e| e.with_target(name, reference))
    }

    /// Fetch `reference` and require it to be an image manifest
    pub async fn fetch_manifest(&self, name: &str, reference: &str) -> Result<ImageManifest> {
        match self.fetch_manifest_or_index(name, reference).await? {
            ManifestOrIndex::Manifest(manifest) => Ok(manifest),
            ManifestOrIndex::Index(_) => Err(RegistryError::protocol(
                Phase::FetchManifest,
                None,
                "reference is an image index; resolve a platform manifest first",
            )
            .with_target(name, reference)),
        }
    }

    /// Follow indexes down to an image manifest
    ///
    /// `select` picks the entry to follow from each index it is given; the
    /// client never chooses a platform itself. Returns a protocol error when
    /// `select` declines or the nesting exceeds [`MAX_INDEX_DEPTH`].
    pub async fn resolve_manifest<F>(&self, name: &str, reference: &str, select: F) -> Result<ImageManifest>
    where
        F: Fn(&ImageIndex) -> Option<&Descriptor>,
    {
        let mut current = reference.to_string();
        for _ in 0..=MAX_INDEX_DEPTH {
            match self.fetch_manifest_or_index(name, &current).await? {
                ManifestOrIndex::Manifest(manifest) => return Ok(manifest),
                ManifestOrIndex::Index(index) => {
                    let entry = select(&index).ok_or_else(|| {
                        RegistryError::protocol(Phase::FetchManifest, None, "no index entry selected")
                            .with_target(name, &current)
                    })?;
                    self.output
                        .detail(&format!("Following index entry {}", entry.digest.short()));
                    current = entry.digest.to_string();
                }
            }
        }

        Err(RegistryError::protocol(
            Phase::FetchManifest,
            None,
            format!("index nesting deeper than {}", MAX_INDEX_DEPTH),
        )
        .with_target(name, reference))
    }

    /// Upload a manifest or index under `reference`
    ///
    /// Returns the `Location` the registry reported, if any.
    pub async fn push_manifest(
        &self,
        name: &str,
        reference: &str,
        manifest: &ManifestOrIndex,
    ) -> Result<Option<Url>> {
        validate_name(name)?;
        validate_reference(reference)?;
        self.put_manifest(name, reference, manifest)
            .await
            .map_err(|e| e.with_target(name, reference))
    }

    async fn get_manifest(&self, name: &str, reference: &str) -> Result<ManifestOrIndex> {
        let url = self.v2_url(&format!("{}/manifests/{}", name, reference))?;

        let mut headers = HeaderMap::new();
        for accepted in media_type::MANIFEST_ACCEPT {
            headers.append(ACCEPT, HeaderValue::from_static(accepted));
        }

        let response = self.request(Method::GET, url, headers, None).await?;
        let status = response.status;
        if status != StatusCode::OK {
            return Err(unexpected(Phase::FetchManifest, status, response).await);
        }

        let body = response.bytes().await?;
        if is_digest_reference(reference) {
            verify_manifest_digest(reference, &body)?;
        }

        let decoded = ManifestOrIndex::from_slice(&body)?;
        self.output.detail(&format!(
            "Fetched {} for {}:{} ({})",
            decoded.media_type(),
            name,
            reference,
            self.output.format_size(body.len() as u64)
        ));
        Ok(decoded)
    }

    async fn put_manifest(&self, name: &str, reference: &str, manifest: &ManifestOrIndex) -> Result<Option<Url>> {
        let url = self.v2_url(&format!("{}/manifests/{}", name, reference))?;

        let body = Bytes::from(manifest.to_json()?);
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_str(manifest.media_type()).map_err(|_| {
                RegistryError::validation("mediaType", manifest.media_type(), "is not a valid header value")
            })?,
        );

        let response = self.request(Method::PUT, url, headers, Some(body)).await?;
        let status = response.status;
        if status != StatusCode::CREATED {
            return Err(unexpected(Phase::PushManifest, status, response).await);
        }

        self.output
            .success(&format!("Manifest pushed for {}:{}", name, reference));
        match response.header("Location") {
            Some(value) => self
                .resolve_location(Some(value), Phase::PushManifest, status.as_u16())
                .map(Some),
            None => Ok(None),
        }
    }
}

/// A manifest fetched by digest must hash to that digest
fn verify_manifest_digest(reference: &str, body: &[u8]) -> Result<()> {
    // only sha256 digests can be checked here
    let Ok(expected) = reference.parse::<ContentDigest>() else {
        return Ok(());
    };
    let actual = ContentDigest::of(body);
    if actual == expected {
        Ok(())
    } else {
        Err(RegistryError::ManifestDigest {
            reference: expected.to_string(),
            actual_digest: actual.to_string(),
        })
    }
}
