//! Repository name and reference validation
//!
//! Every check is a full-string match and runs before any request is built.

use crate::error::{RegistryError, Result};
use regex::Regex;
use std::sync::LazyLock;

static NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]+((\.|_|__|-+)[a-z0-9]+)*(/[a-z0-9]+((\.|_|__|-+)[a-z0-9]+)*)*$")
        .unwrap_or_else(|e| unreachable!("name pattern is valid: {e}"))
});

static TAG_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9._-]{0,127}$")
        .unwrap_or_else(|e| unreachable!("tag pattern is valid: {e}"))
});

static DIGEST_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]+([+._-][a-z0-9]+)*:[a-zA-Z0-9=_-]+$")
        .unwrap_or_else(|e| unreachable!("digest pattern is valid: {e}"))
});

/// Validate a repository name such as `turbot/steampipe`
pub fn validate_name(name: &str) -> Result<()> {
    if NAME_REGEX.is_match(name) {
        Ok(())
    } else {
        Err(RegistryError::validation(
            "name",
            name,
            "is not a valid repository name",
        ))
    }
}

/// Validate a tag such as `latest`
pub fn validate_tag(tag: &str) -> Result<()> {
    if TAG_REGEX.is_match(tag) {
        Ok(())
    } else {
        Err(RegistryError::validation("tag", tag, "is not a valid tag"))
    }
}

pub fn is_digest_reference(reference: &str) -> bool {
    DIGEST_REGEX.is_match(reference)
}

/// Validate a manifest reference: a tag or a digest
pub fn validate_reference(reference: &str) -> Result<()> {
    if TAG_REGEX.is_match(reference) || DIGEST_REGEX.is_match(reference) {
        Ok(())
    } else {
        Err(RegistryError::validation(
            "reference",
            reference,
            "is neither a valid tag nor a digest",
        ))
    }
}
