//! SHA256 content addressing for OCI blobs
//!
//! This module computes and verifies the digests that identify every blob,
//! manifest and index exchanged with a registry.

use crate::error::{RegistryError, Result};
use crate::image::descriptor::Descriptor;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Hash algorithm used for every digest produced by this crate
pub const ALGORITHM: &str = "sha256";

const SHA256_HEX_LEN: usize = 64;

/// Algorithm-tagged hash in its canonical `sha256:<hex>` form
///
/// Equality is case-sensitive on the hex part.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentDigest {
    hex: String,
}

impl ContentDigest {
    /// Digest of `data`
    pub fn of(data: &[u8]) -> Self {
        let mut hasher = ContentHasher::new();
        hasher.update(data);
        hasher.finalize()
    }

    pub fn algorithm(&self) -> &str {
        ALGORITHM
    }

    /// Encoded hash without the algorithm prefix
    pub fn hex(&self) -> &str {
        &self.hex
    }

    /// Shortened form for log output
    pub fn short(&self) -> String {
        format!("{}:{}", ALGORITHM, &self.hex[..12])
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", ALGORITHM, self.hex)
    }
}

impl FromStr for ContentDigest {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self> {
        let (algorithm, hex) = s
            .split_once(':')
            .ok_or_else(|| RegistryError::validation("digest", s, "is missing the algorithm prefix"))?;

        if algorithm != ALGORITHM {
            return Err(RegistryError::validation(
                "digest",
                s,
                format!("uses unsupported algorithm '{}'", algorithm),
            ));
        }
        if hex.len() != SHA256_HEX_LEN || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(RegistryError::validation(
                "digest",
                s,
                "must carry 64 hex characters",
            ));
        }

        Ok(Self { hex: hex.to_string() })
    }
}

impl TryFrom<String> for ContentDigest {
    type Error = RegistryError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ContentDigest> for String {
    fn from(digest: ContentDigest) -> Self {
        digest.to_string()
    }
}

/// Incremental hasher for content that arrives in chunks
#[derive(Debug, Clone, Default)]
pub struct ContentHasher {
    hasher: Sha256,
    len: u64,
}

impl ContentHasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
        self.len += data.len() as u64;
    }

    /// Bytes hashed so far
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn finalize(self) -> ContentDigest {
        ContentDigest {
            hex: hex::encode(self.hasher.finalize()),
        }
    }

    /// Compare everything hashed so far against `descriptor`
    pub fn verify(self, descriptor: &Descriptor) -> Result<()> {
        let actual_size = self.len;
        let actual = self.finalize();
        if actual_size == descriptor.size && actual == descriptor.digest {
            Ok(())
        } else {
            Err(RegistryError::Integrity {
                digest: descriptor.digest.to_string(),
                expected_size: descriptor.size,
                actual_digest: actual.to_string(),
                actual_size,
            })
        }
    }
}

pub fn digest_of(data: &[u8]) -> ContentDigest {
    ContentDigest::of(data)
}

/// Whether `data` is exactly the content `descriptor` points at
///
/// Never fails; callers decide what to do with untrusted content.
pub fn verify(descriptor: &Descriptor, data: &[u8]) -> bool {
    verify_integrity(descriptor, data).is_ok()
}

/// Like [`verify`], but reports the mismatch as an integrity error
pub fn verify_integrity(descriptor: &Descriptor, data: &[u8]) -> Result<()> {
    let mut hasher = ContentHasher::new();
    hasher.update(data);
    hasher.verify(descriptor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::media_type;

    const EMPTY_JSON_HEX: &str = "44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a";

    #[test]
    fn test_digest_of_known_content() {
        assert_eq!(digest_of(b"{}").to_string(), format!("sha256:{}", EMPTY_JSON_HEX));
        assert_eq!(
            digest_of(b"").hex(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_digest_is_deterministic() {
        let data = vec![7u8; 4096];
        assert_eq!(digest_of(&data), digest_of(&data));
    }

    #[test]
    fn test_parse_and_display() {
        let text = format!("sha256:{}", EMPTY_JSON_HEX);
        let digest: ContentDigest = text.parse().unwrap();
        assert_eq!(digest.to_string(), text);
        assert_eq!(digest.hex(), EMPTY_JSON_HEX);
        assert_eq!(digest.short(), "sha256:44136fa355b3");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!("44136fa3".parse::<ContentDigest>().is_err());
        assert!("sha512:abcd".parse::<ContentDigest>().is_err());
        assert!("sha256:xyz".parse::<ContentDigest>().is_err());
        let err = format!("md5:{}", EMPTY_JSON_HEX).parse::<ContentDigest>().unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_equality_is_case_sensitive() {
        let lower: ContentDigest = format!("sha256:{}", EMPTY_JSON_HEX).parse().unwrap();
        let upper: ContentDigest = format!("sha256:{}", EMPTY_JSON_HEX.to_uppercase()).parse().unwrap();
        assert_ne!(lower, upper);
    }

    #[test]
    fn test_serde_as_string() {
        let digest = digest_of(b"{}");
        let json = serde_json::to_string(&digest).unwrap();
        assert_eq!(json, format!("\"sha256:{}\"", EMPTY_JSON_HEX));
        let back: ContentDigest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, digest);
        assert!(serde_json::from_str::<ContentDigest>("\"sha256:nope\"").is_err());
    }

    #[test]
    fn test_verify_detects_single_byte_change() {
        let mut data = b"layer contents".to_vec();
        let descriptor = Descriptor::from_bytes(media_type::IMAGE_LAYER_TAR, &data);
        assert!(verify(&descriptor, &data));

        data[3] ^= 0x01;
        assert!(!verify(&descriptor, &data));
        assert!(verify_integrity(&descriptor, &data).unwrap_err().is_integrity());
    }

    #[test]
    fn test_verify_detects_size_mismatch() {
        let data = b"abc";
        let mut descriptor = Descriptor::from_bytes(media_type::IMAGE_LAYER_TAR, data);
        descriptor.size = 4;
        assert!(!verify(&descriptor, data));
    }

    #[test]
    fn test_incremental_matches_one_shot() {
        let data = b"hello chunked world";
        let mut hasher = ContentHasher::new();
        for chunk in data.chunks(4) {
            hasher.update(chunk);
        }
        assert_eq!(hasher.len(), data.len() as u64);
        assert_eq!(hasher.finalize(), digest_of(data));
    }
}
