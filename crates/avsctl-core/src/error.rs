//! Top-level error taxonomy for avsctl.

use std::path::PathBuf;

use container_runtime::RuntimeError;
use release_ledger::{Address, LedgerError, ReleaseId, SignerError};

use crate::classify::ReleaseQuery;
use crate::reference::ReferenceError;

/// avsctl domain errors.
///
/// Ledger and runtime failures are wrapped, never rewritten, except by
/// [`crate::classify_read_error`] which produces the release-lookup
/// variants.
#[derive(Debug, thiserror::Error)]
pub enum AvsctlError {
    /// A required parameter is missing from both flags and the current context
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("failed to access config file {}: {source}", path.display())]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config file {} is not valid JSON: {source}", path.display())]
    ConfigFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(
        "no releases available for this operator set\n\n\
         To push a release, run:\n  avsctl push --image <your-image>\n\n\
         Current configuration:\n  AVS: {avs}\n  Operator Set: {operator_set_id}"
    )]
    NoReleasesAvailable { avs: Address, operator_set_id: u32 },

    #[error("{}", release_not_found(.query, .total))]
    ReleaseNotFound {
        query: ReleaseQuery,
        /// Known release count, when the caller checked it first
        total: Option<u64>,
    },

    /// Ledger read failure the classifier did not recognise
    #[error(transparent)]
    LedgerRead(LedgerError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Signer(#[from] SignerError),

    #[error("failed to build reference: {0}")]
    Reference(#[from] ReferenceError),

    #[error("failed to {op}: {source}")]
    Runtime {
        op: &'static str,
        #[source]
        source: RuntimeError,
    },

    #[error(
        "no artifacts in release {release_id}\n\n\
         Publish a release with at least one image:\n  avsctl push --image <your-image>\n\n\
         Current configuration:\n  AVS: {avs}\n  Operator Set: {operator_set_id}"
    )]
    NoArtifactsInRelease {
        release_id: ReleaseId,
        avs: Address,
        operator_set_id: u32,
    },

    #[error(
        "metadata URI not set for this operator set\n\n\
         Set it before pushing releases:\n  avsctl metadata set --uri <metadata-uri>\n\n\
         Current configuration:\n  AVS: {avs}\n  Operator Set: {operator_set_id}"
    )]
    MetadataUriNotSet { avs: Address, operator_set_id: u32 },

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

fn release_not_found(query: &ReleaseQuery, total: &Option<u64>) -> String {
    match (query, total) {
        (ReleaseQuery::Latest, _) => "no releases found (the operator set may not have any releases yet)\n\n\
             To push a release, run:\n  avsctl push --image <your-image>"
            .to_string(),
        (ReleaseQuery::Id(id), Some(total)) => format!(
            "release ID {id} does not exist (operator set has {total} release{})",
            if *total == 1 { "" } else { "s" }
        ),
        (ReleaseQuery::Id(id), None) => format!("release ID {id} does not exist"),
    }
}

impl AvsctlError {
    pub(crate) fn runtime(op: &'static str, source: RuntimeError) -> Self {
        AvsctlError::Runtime { op, source }
    }
}

/// Result type for avsctl domain operations.
pub type Result<T> = std::result::Result<T, AvsctlError>;
