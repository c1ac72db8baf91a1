//! Publishing releases and metadata to the ledger.
//!
//! Both flows submit a transaction and return as soon as the node accepts
//! it. A release can only be published once the operator set has a
//! metadata URI; that check happens before any image is pushed.

use chrono::{DateTime, Duration, Utc};
use container_runtime::ImagePublisher;
use release_ledger::{Artifact, OperatorSet, ReleaseLedger, TxHandle};
use tracing::info;

use crate::error::{AvsctlError, Result};
use crate::reference::digest_to_reference_string;

pub const DEFAULT_RELEASE_GAS_LIMIT: u64 = 500_000;
pub const DEFAULT_METADATA_GAS_LIMIT: u64 = 200_000;

/// Upgrade window applied when no deadline is given.
pub const DEFAULT_UPGRADE_WINDOW_DAYS: i64 = 30;

/// Parameters of one `push`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushSpec {
    pub operator_set: OperatorSet,
    /// Local image names, each becoming one artifact in order
    pub images: Vec<String>,
    /// Repository recorded on-chain instead of the one the engine reports
    pub registry: Option<String>,
    pub upgrade_by_time: Option<u32>,
    pub gas_limit: Option<u64>,
    /// Use images already present in the registry
    pub skip_push: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOutcome {
    pub tx: TxHandle,
    pub artifacts: Vec<Artifact>,
    pub upgrade_by_time: u32,
}

/// `now` plus the default upgrade window, as a ledger timestamp.
pub fn default_upgrade_by_time(now: DateTime<Utc>) -> Result<u32> {
    let deadline = now + Duration::days(DEFAULT_UPGRADE_WINDOW_DAYS);
    u32::try_from(deadline.timestamp()).map_err(|_| {
        AvsctlError::InvalidInput(format!("upgrade deadline {deadline} does not fit in u32"))
    })
}

/// Push images, read their digests and publish them as one release.
pub async fn publish_release(
    ledger: &dyn ReleaseLedger,
    publisher: &dyn ImagePublisher,
    spec: &PushSpec,
    now: DateTime<Utc>,
) -> Result<PublishOutcome> {
    let set = spec.operator_set;
    if spec.images.is_empty() {
        return Err(AvsctlError::InvalidInput(
            "at least one --image is required".to_string(),
        ));
    }

    let metadata_uri = ledger.metadata_uri(set).await?;
    if metadata_uri.is_empty() {
        return Err(AvsctlError::MetadataUriNotSet {
            avs: set.avs,
            operator_set_id: set.id,
        });
    }
    info!(uri = %metadata_uri, "metadata URI verified");

    let mut artifacts = Vec::with_capacity(spec.images.len());
    for image in &spec.images {
        if !spec.skip_push {
            publisher
                .push(image)
                .await
                .map_err(|e| AvsctlError::runtime("push image", e))?;
        }
        let repo = publisher
            .repo_digest(image)
            .await
            .map_err(|e| AvsctlError::runtime("read image digest", e))?;

        let registry = spec
            .registry
            .clone()
            .filter(|r| !r.is_empty())
            .unwrap_or(repo.repository);
        info!(
            image = %image,
            registry = %registry,
            digest = %digest_to_reference_string(&repo.digest),
            "prepared artifact"
        );
        artifacts.push(Artifact::new(registry, repo.digest));
    }

    let upgrade_by_time = match spec.upgrade_by_time.filter(|t| *t != 0) {
        Some(t) => t,
        None => default_upgrade_by_time(now)?,
    };
    let gas_limit = spec.gas_limit.unwrap_or(DEFAULT_RELEASE_GAS_LIMIT);

    let tx = ledger
        .publish_release(set, &artifacts, upgrade_by_time, gas_limit)
        .await?;
    info!(tx_hash = %tx.hash, artifacts = artifacts.len(), upgrade_by_time, "release submitted");

    Ok(PublishOutcome {
        tx,
        artifacts,
        upgrade_by_time,
    })
}

/// Register or replace the metadata URI of an operator set.
pub async fn set_metadata_uri(
    ledger: &dyn ReleaseLedger,
    set: OperatorSet,
    uri: &str,
    gas_limit: Option<u64>,
) -> Result<TxHandle> {
    let uri = uri.trim();
    if uri.is_empty() {
        return Err(AvsctlError::InvalidInput("--uri must not be empty".to_string()));
    }
    let tx = ledger
        .publish_metadata_uri(set, uri, gas_limit.unwrap_or(DEFAULT_METADATA_GAS_LIMIT))
        .await?;
    info!(tx_hash = %tx.hash, uri, "metadata URI submitted");
    Ok(tx)
}
