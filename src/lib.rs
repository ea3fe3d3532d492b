//! OCI Distribution client library
//!
//! Resolves and fetches manifests and indexes, streams blobs out of a registry,
//! and pushes blobs through the chunked upload protocol followed by their
//! manifest.

pub mod config;
pub mod digest;
pub mod error;
pub mod image;
pub mod logging;
pub mod registry;
pub mod upload;

pub use config::{AuthConfig, ClientConfig};
pub use digest::{ContentDigest, digest_of, verify};
pub use error::{Phase, RegistryError, Result};
pub use image::{Descriptor, ImageIndex, ImageManifest, Layer, Manifest, ManifestOptions, ManifestOrIndex};
pub use logging::Logger;
pub use registry::{RegistryClient, RegistryClientBuilder};
