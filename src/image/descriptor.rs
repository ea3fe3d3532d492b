//! Content descriptors

use crate::digest::ContentDigest;
use crate::error::{RegistryError, Result};
use crate::image::media_type;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Digest of the two bytes `{}`
pub const EMPTY_DIGEST: &str =
    "sha256:44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a";

/// Base64 form of `{}`, embedded in the empty descriptor
pub const EMPTY_DATA: &str = "e30=";

pub const EMPTY_CONTENT: &[u8] = b"{}";

/// Content-addressed pointer to a blob
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    pub media_type: String,
    pub digest: ContentDigest,
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urls: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,
    /// Base64 of the referenced content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_type: Option<String>,
    /// Only present on index entries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
}

/// Minimum runtime requirements of a platform-specific manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    pub architecture: String,
    pub os: String,
    #[serde(rename = "os.version", default, skip_serializing_if = "Option::is_none")]
    pub os_version: Option<String>,
    #[serde(rename = "os.features", default, skip_serializing_if = "Option::is_none")]
    pub os_features: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
}

impl Platform {
    pub fn new(os: &str, architecture: &str) -> Self {
        Self {
            architecture: architecture.to_string(),
            os: os.to_string(),
            os_version: None,
            os_features: None,
            variant: None,
        }
    }

    /// True when os and architecture agree, and the variant too if `self` names one
    pub fn matches(&self, other: &Platform) -> bool {
        self.os == other.os
            && self.architecture == other.architecture
            && (self.variant.is_none() || self.variant == other.variant)
    }
}

impl Descriptor {
    /// Descriptor of `data`, computed from the content itself
    pub fn from_bytes(media_type: &str, data: &[u8]) -> Self {
        Self {
            media_type: media_type.to_string(),
            digest: ContentDigest::of(data),
            size: data.len() as u64,
            urls: None,
            annotations: None,
            data: None,
            artifact_type: None,
            platform: None,
        }
    }

    /// The canonical empty descriptor: `{}` with its content embedded
    pub fn empty() -> Self {
        let mut descriptor = Self::from_bytes(media_type::EMPTY, EMPTY_CONTENT);
        descriptor.data = Some(EMPTY_DATA.to_string());
        descriptor
    }

    pub fn is_empty_descriptor(&self) -> bool {
        self.media_type == media_type::EMPTY && self.digest.to_string() == EMPTY_DIGEST
    }

    /// Decoded `data` field, if the content is embedded
    pub fn embedded_data(&self) -> Result<Option<Vec<u8>>> {
        match &self.data {
            Some(encoded) => STANDARD.decode(encoded).map(Some).map_err(|e| {
                RegistryError::validation("descriptor data", encoded, format!("is not valid base64: {}", e))
            }),
            None => Ok(None),
        }
    }

    pub fn with_annotation(mut self, key: &str, value: &str) -> Self {
        self.annotations
            .get_or_insert_with(BTreeMap::new)
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::verify;

    #[test]
    fn test_empty_descriptor_constants() {
        let empty = Descriptor::empty();
        assert_eq!(empty.digest.to_string(), EMPTY_DIGEST);
        assert_eq!(empty.size, 2);
        assert_eq!(empty.data.as_deref(), Some(EMPTY_DATA));
        assert_eq!(empty.media_type, media_type::EMPTY);
        assert!(empty.is_empty_descriptor());
        assert_eq!(empty.embedded_data().unwrap().as_deref(), Some(EMPTY_CONTENT));
        assert!(verify(&empty, EMPTY_CONTENT));
    }

    #[test]
    fn test_serialize_skips_absent_fields() {
        let descriptor = Descriptor::from_bytes(media_type::IMAGE_CONFIG, b"{}");
        let json = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(json["mediaType"], media_type::IMAGE_CONFIG);
        assert_eq!(json["size"], 2);
        assert!(json.get("urls").is_none());
        assert!(json.get("data").is_none());
        assert!(json.get("platform").is_none());
    }

    #[test]
    fn test_deserialize_index_entry_with_platform() {
        let json = r#"{
            "mediaType": "application/vnd.oci.image.manifest.v1+json",
            "digest": "sha256:44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a",
            "size": 2,
            "platform": {"architecture": "arm64", "os": "linux", "variant": "v8", "os.features": ["x"]}
        }"#;
        let descriptor: Descriptor = serde_json::from_str(json).unwrap();
        let platform = descriptor.platform.unwrap();
        assert_eq!(platform.variant.as_deref(), Some("v8"));
        assert_eq!(platform.os_features, Some(vec!["x".to_string()]));
        assert!(Platform::new("linux", "arm64").matches(&platform));
        assert!(!Platform::new("linux", "amd64").matches(&platform));
    }

    #[test]
    fn test_invalid_embedded_data() {
        let mut descriptor = Descriptor::empty();
        descriptor.data = Some("!!".to_string());
        assert!(descriptor.embedded_data().unwrap_err().is_validation());
    }
}
