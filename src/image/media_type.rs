//! Media types and annotation keys defined by the OCI image specification

pub const DESCRIPTOR: &str = "application/vnd.oci.descriptor.v1+json";
pub const LAYOUT_HEADER: &str = "application/vnd.oci.layout.header.v1+json";
pub const IMAGE_INDEX: &str = "application/vnd.oci.image.index.v1+json";
pub const IMAGE_MANIFEST: &str = "application/vnd.oci.image.manifest.v1+json";
pub const IMAGE_CONFIG: &str = "application/vnd.oci.image.config.v1+json";
pub const IMAGE_LAYER_TAR: &str = "application/vnd.oci.image.layer.v1.tar";
pub const IMAGE_LAYER_TAR_GZIP: &str = "application/vnd.oci.image.layer.v1.tar+gzip";
pub const IMAGE_LAYER_TAR_ZSTD: &str = "application/vnd.oci.image.layer.v1.tar+zstd";
pub const EMPTY: &str = "application/vnd.oci.empty.v1+json";

/// Media types sent in `Accept` when fetching a manifest or index
pub const MANIFEST_ACCEPT: [&str; 2] = [IMAGE_INDEX, IMAGE_MANIFEST];

/// Whether `media_type` names one of the image layer formats
pub fn is_layer(media_type: &str) -> bool {
    matches!(
        media_type,
        IMAGE_LAYER_TAR | IMAGE_LAYER_TAR_GZIP | IMAGE_LAYER_TAR_ZSTD
    )
}

/// Pre-defined annotation keys
pub mod annotation {
    pub const CREATED: &str = "org.opencontainers.image.created";
    pub const AUTHORS: &str = "org.opencontainers.image.authors";
    pub const URL: &str = "org.opencontainers.image.url";
    pub const DOCUMENTATION: &str = "org.opencontainers.image.documentation";
    pub const SOURCE: &str = "org.opencontainers.image.source";
    pub const VERSION: &str = "org.opencontainers.image.version";
    pub const REVISION: &str = "org.opencontainers.image.revision";
    pub const VENDOR: &str = "org.opencontainers.image.vendor";
    pub const LICENSES: &str = "org.opencontainers.image.licenses";
    pub const REF_NAME: &str = "org.opencontainers.image.ref.name";
    pub const TITLE: &str = "org.opencontainers.image.title";
    pub const DESCRIPTION: &str = "org.opencontainers.image.description";
    pub const BASE_DIGEST: &str = "org.opencontainers.image.base.digest";
    pub const BASE_NAME: &str = "org.opencontainers.image.base.name";
}
