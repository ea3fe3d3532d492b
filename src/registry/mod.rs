//! Registry module for OCI Distribution interactions
//!
//! This module provides the client, its transport seam, name/reference
//! validation and the blob and manifest operations.

pub mod client;
pub mod operations;
pub mod reference;
pub mod transport;

pub use client::{RegistryClient, RegistryClientBuilder, merge_headers};
pub use operations::PushedBlob;
pub use reference::{validate_name, validate_reference, validate_tag};
pub use transport::{BlobStream, HttpTransport, RegistryTransport, TransportRequest, TransportResponse};
