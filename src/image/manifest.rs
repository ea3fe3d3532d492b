//! Wire manifests and indexes
//!
//! A registry answers a manifest GET with either an image manifest or an
//! image index. The payload is decoded in two steps: `mediaType` is read
//! first, then the document is decoded into the variant it names. A missing
//! or unrecognized `mediaType` is rejected instead of guessed.

use crate::digest::ContentDigest;
use crate::error::{Phase, RegistryError, Result};
use crate::image::descriptor::Descriptor;
use crate::image::media_type;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const SCHEMA_VERSION: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageManifest {
    pub schema_version: u32,
    pub media_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Descriptor>,
    #[serde(default)]
    pub layers: Vec<Descriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<Descriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageIndex {
    pub schema_version: u32,
    pub media_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_type: Option<String>,
    #[serde(default)]
    pub manifests: Vec<Descriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<Descriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,
}

impl ImageIndex {
    pub fn new(manifests: Vec<Descriptor>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            media_type: media_type::IMAGE_INDEX.to_string(),
            artifact_type: None,
            manifests,
            subject: None,
            annotations: None,
        }
    }

    /// First entry accepted by `predicate`
    pub fn find<F>(&self, predicate: F) -> Option<&Descriptor>
    where
        F: Fn(&Descriptor) -> bool,
    {
        self.manifests.iter().find(|entry| predicate(entry))
    }

    pub fn digests(&self) -> impl Iterator<Item = &ContentDigest> {
        self.manifests.iter().map(|entry| &entry.digest)
    }
}

/// Either document a manifest endpoint may return
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ManifestOrIndex {
    Manifest(ImageManifest),
    Index(ImageIndex),
}

impl ManifestOrIndex {
    /// Decode a manifest endpoint payload by its `mediaType`
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_slice(body).map_err(|e| {
            RegistryError::protocol(Phase::FetchManifest, None, format!("response is not JSON: {}", e))
        })?;

        let tag = value
            .get("mediaType")
            .and_then(|m| m.as_str())
            .ok_or_else(|| {
                RegistryError::protocol(Phase::FetchManifest, None, "response is missing a string mediaType field")
            })?
            .to_string();

        let decoded = match tag.as_str() {
            media_type::IMAGE_MANIFEST => serde_json::from_value(value).map(ManifestOrIndex::Manifest),
            media_type::IMAGE_INDEX => serde_json::from_value(value).map(ManifestOrIndex::Index),
            other => {
                return Err(RegistryError::protocol(
                    Phase::FetchManifest,
                    None,
                    format!("unexpected media type '{}'", other),
                ));
            }
        };

        decoded.map_err(|e| {
            RegistryError::protocol(
                Phase::FetchManifest,
                None,
                format!("malformed {} document: {}", tag, e),
            )
        })
    }

    pub fn media_type(&self) -> &str {
        match self {
            ManifestOrIndex::Manifest(manifest) => &manifest.media_type,
            ManifestOrIndex::Index(index) => &index.media_type,
        }
    }

    pub fn is_index(&self) -> bool {
        matches!(self, ManifestOrIndex::Index(_))
    }

    pub fn as_manifest(&self) -> Option<&ImageManifest> {
        match self {
            ManifestOrIndex::Manifest(manifest) => Some(manifest),
            ManifestOrIndex::Index(_) => None,
        }
    }

    pub fn as_index(&self) -> Option<&ImageIndex> {
        match self {
            ManifestOrIndex::Index(index) => Some(index),
            ManifestOrIndex::Manifest(_) => None,
        }
    }

    pub fn into_manifest(self) -> Option<ImageManifest> {
        match self {
            ManifestOrIndex::Manifest(manifest) => Some(manifest),
            ManifestOrIndex::Index(_) => None,
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

impl From<ImageManifest> for ManifestOrIndex {
    fn from(manifest: ImageManifest) -> Self {
        ManifestOrIndex::Manifest(manifest)
    }
}

impl From<ImageIndex> for ManifestOrIndex {
    fn from(index: ImageIndex) -> Self {
        ManifestOrIndex::Index(index)
    }
}
