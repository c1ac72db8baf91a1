//! Release ledger capability.
//!
//! `ReleaseLedger` is the seam between avsctl's workflows and the chain.
//! Every query is scoped by an [`OperatorSet`]; writes return a handle to
//! the submitted transaction without waiting for inclusion.
//!
//! In-memory fakes are provided in the `fakes` module.

use async_trait::async_trait;

use crate::types::{Artifact, OperatorSet, Release, ReleaseId, TxHandle};
use crate::Result;

/// Read/write access to release records.
///
/// Guarantees:
/// - Release ids are assigned by the ledger, monotonically per operator set.
/// - Published releases are immutable.
/// - Read failures keep the ledger's raw message (see
///   [`crate::LedgerError::read_message`]) so callers can classify reverts.
#[async_trait]
pub trait ReleaseLedger: Send + Sync {
    /// Most recent release and its id. Fails if the set has no releases.
    async fn latest_release(&self, set: OperatorSet) -> Result<(Release, ReleaseId)>;

    /// Release by id. Fails if the id is out of range.
    async fn release(&self, set: OperatorSet, id: ReleaseId) -> Result<Release>;

    /// Number of releases published for the set.
    async fn total_releases(&self, set: OperatorSet) -> Result<u64>;

    /// Upgrade deadline of the latest release.
    async fn latest_upgrade_by_time(&self, set: OperatorSet) -> Result<u32>;

    /// Metadata URI registered for the set; empty when never published.
    async fn metadata_uri(&self, set: OperatorSet) -> Result<String>;

    /// Register or replace the metadata URI. Requires a signer.
    async fn publish_metadata_uri(
        &self,
        set: OperatorSet,
        uri: &str,
        gas_limit: u64,
    ) -> Result<TxHandle>;

    /// Append a release. Requires a signer.
    async fn publish_release(
        &self,
        set: OperatorSet,
        artifacts: &[Artifact],
        upgrade_by_time: u32,
        gas_limit: u64,
    ) -> Result<TxHandle>;
}
