//! Error types and handlers for registry operations

pub mod handlers;

use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RegistryError>;

/// Protocol step an error was raised in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    StartSession,
    UploadChunk,
    FinalizeUpload,
    BlobExists,
    FetchBlob,
    FetchManifest,
    PushManifest,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::StartSession => "upload session start",
            Phase::UploadChunk => "chunk upload",
            Phase::FinalizeUpload => "upload finalize",
            Phase::BlobExists => "blob existence check",
            Phase::FetchBlob => "blob fetch",
            Phase::FetchManifest => "manifest fetch",
            Phase::PushManifest => "manifest push",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    /// Malformed input, detected before any request is sent
    #[error("Validation error: {field} '{value}' {reason}")]
    Validation {
        field: &'static str,
        value: String,
        reason: String,
    },

    /// The registry deviated from the HTTP contract
    #[error(
        "Protocol error during {phase}{}{}: {message}",
        target_suffix(.name, .reference),
        status_suffix(.status)
    )]
    Protocol {
        phase: Phase,
        status: Option<u16>,
        /// Repository the failed call addressed
        name: Option<String>,
        /// Tag or digest the failed call addressed
        reference: Option<String>,
        message: String,
    },

    /// Content did not match its descriptor
    #[error(
        "Integrity error: expected {digest} ({expected_size} bytes), got {actual_digest} ({actual_size} bytes)"
    )]
    Integrity {
        digest: String,
        expected_size: u64,
        actual_digest: String,
        actual_size: u64,
    },

    /// A manifest fetched by digest hashed to something else
    #[error("Integrity error: manifest fetched as {reference} hashes to {actual_digest}")]
    ManifestDigest {
        reference: String,
        actual_digest: String,
    },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Failure reported by a non-reqwest transport
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Configuration error: {0}")]
    Config(String),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (status {})", s)).unwrap_or_default()
}

fn target_suffix(name: &Option<String>, reference: &Option<String>) -> String {
    match (name, reference) {
        // tags never contain ':', digests always do
        (Some(name), Some(reference)) if reference.contains(':') => format!(" of {}@{}", name, reference),
        (Some(name), Some(reference)) => format!(" of {}:{}", name, reference),
        (Some(name), None) => format!(" of {}", name),
        (None, _) => String::new(),
    }
}

impl RegistryError {
    pub fn validation(field: &'static str, value: &str, reason: impl Into<String>) -> Self {
        RegistryError::Validation {
            field,
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    pub fn protocol(phase: Phase, status: Option<u16>, message: impl Into<String>) -> Self {
        RegistryError::Protocol {
            phase,
            status,
            name: None,
            reference: None,
            message: message.into(),
        }
    }

    /// Attach the repository and reference a protocol error is about
    ///
    /// Context already present is kept; other variants pass through unchanged.
    pub fn with_target(self, target_name: &str, target_reference: &str) -> Self {
        match self {
            RegistryError::Protocol {
                phase,
                status,
                name,
                reference,
                message,
            } => RegistryError::Protocol {
                phase,
                status,
                name: name.or_else(|| Some(target_name.to_string())),
                reference: reference.or_else(|| Some(target_reference.to_string())),
                message,
            },
            other => other,
        }
    }

    pub fn missing_location(phase: Phase, status: u16) -> Self {
        Self::protocol(
            phase,
            Some(status),
            "response is missing the Location header",
        )
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, RegistryError::Validation { .. })
    }

    pub fn is_protocol(&self) -> bool {
        matches!(self, RegistryError::Protocol { .. })
    }

    pub fn is_integrity(&self) -> bool {
        matches!(
            self,
            RegistryError::Integrity { .. } | RegistryError::ManifestDigest { .. }
        )
    }

    /// HTTP status carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            RegistryError::Protocol { status, .. } => *status,
            RegistryError::Network(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Repository named by a protocol error
    pub fn repository(&self) -> Option<&str> {
        match self {
            RegistryError::Protocol { name, .. } => name.as_deref(),
            _ => None,
        }
    }

    /// Tag or digest named by the error
    pub fn reference(&self) -> Option<&str> {
        match self {
            RegistryError::Protocol { reference, .. } => reference.as_deref(),
            RegistryError::Integrity { digest, .. } => Some(digest.as_str()),
            RegistryError::ManifestDigest { reference, .. } => Some(reference.as_str()),
            _ => None,
        }
    }

    pub fn phase(&self) -> Option<Phase> {
        match self {
            RegistryError::Protocol { phase, .. } => Some(*phase),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_error_display_includes_phase_and_status() {
        let err = RegistryError::protocol(Phase::FetchBlob, Some(404), "blob unknown");
        assert_eq!(
            err.to_string(),
            "Protocol error during blob fetch (status 404): blob unknown"
        );
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.phase(), Some(Phase::FetchBlob));
    }

    #[test]
    fn test_missing_location_is_protocol() {
        let err = RegistryError::missing_location(Phase::StartSession, 202);
        assert!(err.is_protocol());
        assert!(!err.is_validation());
        assert!(err.to_string().contains("Location"));
    }

    #[test]
    fn test_target_is_rendered_and_kept() {
        let digest = "sha256:44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a";
        let err = RegistryError::protocol(Phase::FetchBlob, Some(404), "blob unknown").with_target("demo/app", digest);
        assert_eq!(
            err.to_string(),
            format!("Protocol error during blob fetch of demo/app@{} (status 404): blob unknown", digest)
        );
        assert_eq!(err.repository(), Some("demo/app"));
        assert_eq!(err.reference(), Some(digest));

        // the innermost context wins
        let err = err.with_target("other", "latest");
        assert_eq!(err.repository(), Some("demo/app"));

        let tagged = RegistryError::protocol(Phase::FetchManifest, Some(404), "manifest unknown").with_target("demo", "v1");
        assert!(tagged.to_string().contains(" of demo:v1 "));
    }

    #[test]
    fn test_with_target_ignores_other_variants() {
        let err = RegistryError::Config("x".to_string()).with_target("demo", "v1");
        assert!(matches!(err, RegistryError::Config(_)));
        assert_eq!(err.repository(), None);
    }

    #[test]
    fn test_validation_display() {
        let err = RegistryError::validation("name", "Turbot/Steampipe", "is not a valid repository name");
        assert!(err.is_validation());
        assert_eq!(
            err.to_string(),
            "Validation error: name 'Turbot/Steampipe' is not a valid repository name"
        );
    }
}
