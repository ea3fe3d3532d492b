//! Standardized mapping of unexpected registry responses to typed errors

use crate::error::{Phase, RegistryError};
use reqwest::StatusCode;

/// Standard error handler for HTTP responses
pub struct HttpErrorHandler;

impl HttpErrorHandler {
    /// Build a protocol error for a status the current phase does not accept
    pub fn unexpected_status(phase: Phase, status: StatusCode, error_text: &str) -> RegistryError {
        let explanation = match status.as_u16() {
            400 => match phase {
                Phase::FinalizeUpload if error_text.contains("DIGEST_INVALID") => {
                    "registry rejected the digest of the uploaded content".to_string()
                }
                Phase::PushManifest if error_text.contains("MANIFEST_BLOB_UNKNOWN") => {
                    "manifest references a blob the registry does not have".to_string()
                }
                _ => "bad request".to_string(),
            },
            401 => "authentication required or token rejected".to_string(),
            403 => "permission denied".to_string(),
            404 => match phase {
                Phase::UploadChunk | Phase::FinalizeUpload => {
                    "upload session unknown or expired".to_string()
                }
                Phase::FetchManifest => "manifest unknown".to_string(),
                Phase::FetchBlob | Phase::BlobExists => "blob unknown".to_string(),
                _ => "repository not found".to_string(),
            },
            413 => "payload too large for registry".to_string(),
            416 => "requested range not satisfiable, chunk out of order".to_string(),
            429 => "rate limited".to_string(),
            500 => "registry internal server error".to_string(),
            502..=504 => "registry unavailable".to_string(),
            _ => format!("unexpected status {}", status),
        };

        let message = if error_text.trim().is_empty() {
            explanation
        } else {
            format!("{}: {}", explanation, truncate(error_text.trim(), 512))
        };

        RegistryError::protocol(phase, Some(status.as_u16()), message)
    }
}

fn truncate(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
