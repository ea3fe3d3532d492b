//! Registry operations, split by endpoint family
//!
//! Each module extends [`RegistryClient`](crate::registry::RegistryClient) with
//! one group of OCI Distribution calls.

pub mod artifact_operations;
pub mod blob_operations;
pub mod manifest_operations;

pub use blob_operations::{CHUNK_MIN_LENGTH_HEADER, PushedBlob};
pub use manifest_operations::MAX_INDEX_DEPTH;
