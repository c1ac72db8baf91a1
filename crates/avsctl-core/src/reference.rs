//! Pullable artifact references.
//!
//! A release artifact is a registry path plus a 32-byte content digest.
//! Engines want a single `repository@sha256:<hex>` string; registries that
//! already carry a digest are used verbatim.

use thiserror::Error;

/// Prefix of a textual sha256 digest.
pub const DIGEST_PREFIX: &str = "sha256:";

/// Marker of a registry string that is already digest-qualified.
const QUALIFIED_MARKER: &str = "@sha256:";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReferenceError {
    #[error("empty registry")]
    EmptyRegistry,

    #[error("invalid digest format: {0:?} (expected \"sha256:<hex>\")")]
    InvalidDigestFormat(String),
}

/// `"sha256:"` followed by the lowercase hex of `digest` (71 characters).
pub fn digest_to_reference_string(digest: &[u8; 32]) -> String {
    format!("{DIGEST_PREFIX}{}", hex::encode(digest))
}

/// Combine `registry` and a textual `digest` into a pullable reference.
///
/// If `registry` already contains `@sha256:` it is returned unchanged and
/// `digest` is not inspected.
pub fn build_reference(registry: &str, digest: &str) -> Result<String, ReferenceError> {
    if registry.is_empty() {
        return Err(ReferenceError::EmptyRegistry);
    }
    if registry.contains(QUALIFIED_MARKER) {
        return Ok(registry.to_string());
    }
    if !digest.starts_with(DIGEST_PREFIX) {
        return Err(ReferenceError::InvalidDigestFormat(digest.to_string()));
    }
    Ok(format!("{registry}@{digest}"))
}
