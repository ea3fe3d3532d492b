//! Caller-owned artifacts: layers held in memory and the manifest built from them

use crate::image::descriptor::Descriptor;
use crate::image::manifest::{ImageManifest, SCHEMA_VERSION};
use crate::image::media_type;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Blob content with its media type
///
/// The descriptor is derived from the bytes on first use and cached; the
/// content cannot change afterwards.
#[derive(Debug, Clone)]
pub struct Layer {
    media_type: String,
    blob: Bytes,
    descriptor: OnceLock<Descriptor>,
}

impl Layer {
    pub fn new(media_type: &str, blob: impl Into<Bytes>) -> Self {
        Self {
            media_type: media_type.to_string(),
            blob: blob.into(),
            descriptor: OnceLock::new(),
        }
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn blob(&self) -> &Bytes {
        &self.blob
    }

    pub fn into_blob(self) -> Bytes {
        self.blob
    }

    pub fn descriptor(&self) -> &Descriptor {
        self.descriptor
            .get_or_init(|| Descriptor::from_bytes(&self.media_type, &self.blob))
    }
}

impl PartialEq for Layer {
    fn eq(&self, other: &Self) -> bool {
        self.media_type == other.media_type && self.blob == other.blob
    }
}

/// Options accepted by [`Manifest::new`]
#[derive(Debug, Clone, Default)]
pub struct ManifestOptions {
    pub artifact_type: Option<String>,
    /// Defaults to the canonical empty descriptor
    pub config: Option<Descriptor>,
    pub layers: Vec<Layer>,
    pub subject: Option<Descriptor>,
    pub annotations: Option<BTreeMap<String, String>>,
}

/// A pushable artifact
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    pub artifact_type: Option<String>,
    pub config: Descriptor,
    pub layers: Vec<Layer>,
    pub subject: Option<Descriptor>,
    pub annotations: Option<BTreeMap<String, String>>,
}

impl Manifest {
    pub fn new(options: ManifestOptions) -> Self {
        Self {
            artifact_type: options.artifact_type,
            config: options.config.unwrap_or_else(Descriptor::empty),
            layers: options.layers,
            subject: options.subject,
            annotations: options.annotations,
        }
    }

    /// Whether [`serialize`](Self::serialize) will substitute the empty layer
    pub fn uses_empty_layer(&self) -> bool {
        self.layers.is_empty()
    }

    /// Wire form of this artifact
    ///
    /// Registries reject `layers: []`, so an artifact without layers gets the
    /// canonical empty descriptor as its single layer.
    pub fn serialize(&self) -> ImageManifest {
        let mut layers: Vec<Descriptor> = self
            .layers
            .iter()
            .map(|layer| layer.descriptor().clone())
            .collect();
        if layers.is_empty() {
            layers.push(Descriptor::empty());
        }

        ImageManifest {
            schema_version: SCHEMA_VERSION,
            media_type: media_type::IMAGE_MANIFEST.to_string(),
            artifact_type: self.artifact_type.clone(),
            config: Some(self.config.clone()),
            layers,
            subject: self.subject.clone(),
            annotations: self.annotations.clone(),
        }
    }
}

impl Default for Manifest {
    fn default() -> Self {
        Self::new(ManifestOptions::default())
    }
}
