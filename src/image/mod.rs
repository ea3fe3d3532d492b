//! OCI image data model
//!
//! This module holds the data contracts exchanged with a registry and the
//! in-memory artifact model that is turned into them before a push.
//!
//! # Overview
//!
//! - [`media_type`]: exact media type strings and annotation keys
//! - [`descriptor`]: content-addressed pointers, including the canonical empty descriptor
//! - [`manifest`]: wire manifests and indexes, decoded by inspecting `mediaType`
//! - [`artifact`]: [`Layer`] and [`Manifest`], the caller-owned values that serialize to the wire form
//!
//! # Examples
//!
//! ```
//! use oci_transfer::image::{Layer, Manifest, ManifestOptions, media_type};
//!
//! let manifest = Manifest::new(ManifestOptions {
//!     layers: vec![Layer::new(media_type::IMAGE_LAYER_TAR_GZIP, b"layer bytes".to_vec())],
//!     ..Default::default()
//! });
//! let wire = manifest.serialize();
//! assert_eq!(wire.layers.len(), 1);
//! ```

pub mod artifact;
pub mod descriptor;
pub mod manifest;
pub mod media_type;

pub use artifact::{Layer, Manifest, ManifestOptions};
pub use descriptor::{Descriptor, Platform};
pub use manifest::{ImageIndex, ImageManifest, ManifestOrIndex};
