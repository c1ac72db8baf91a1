//! Ledger-side data model: operator sets, artifacts, releases, transactions.

use std::fmt;

use alloy::primitives::{Address, B256, TxHash};

use crate::bindings;
use crate::error::SignerError;
use crate::signer::Signer;

/// Monotonically assigned release identifier, scoped to an [`OperatorSet`].
pub type ReleaseId = u64;

/// `(AVS address, operator set id)` key scoping every release query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OperatorSet {
    pub avs: Address,
    pub id: u32,
}

impl OperatorSet {
    pub fn new(avs: Address, id: u32) -> Self {
        Self { avs, id }
    }
}

impl fmt::Display for OperatorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.avs, self.id)
    }
}

/// One pullable image inside a release.
///
/// `registry` is either a bare repository path or an already digest-qualified
/// reference; in the latter case `digest` is ignored when building references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub registry: String,
    pub digest: [u8; 32],
}

impl Artifact {
    pub fn new(registry: impl Into<String>, digest: [u8; 32]) -> Self {
        Self {
            registry: registry.into(),
            digest,
        }
    }
}

/// An immutable release record as stored on the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Release {
    pub artifacts: Vec<Artifact>,
    /// Unix timestamp by which operators are expected to upgrade
    pub upgrade_by_time: u32,
}

impl Release {
    pub fn new(artifacts: Vec<Artifact>, upgrade_by_time: u32) -> Self {
        Self {
            artifacts,
            upgrade_by_time,
        }
    }
}

/// Ephemeral per-write transaction parameters.
///
/// Built immediately before signing and dropped once the transaction is
/// submitted; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxContext {
    pub chain_id: u64,
    pub nonce: u64,
    pub gas_limit: u64,
    pub gas_price: u128,
    pub from: Address,
}

impl TxContext {
    /// Check that `signer` is allowed to sign for `self.from`.
    ///
    /// Guards against a transport or configuration mix-up where the
    /// transaction is attributed to an address the signer does not control.
    pub fn authorize(&self, signer: &dyn Signer) -> Result<(), SignerError> {
        let signer_address = signer.address();
        if self.from != signer_address {
            return Err(SignerError::UnexpectedSignerAddress {
                requested: self.from,
                signer: signer_address,
            });
        }
        Ok(())
    }
}

/// Handle to a submitted (not yet confirmed) transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxHandle {
    pub hash: TxHash,
    pub from: Address,
    pub to: Address,
    pub nonce: u64,
    pub chain_id: u64,
}

impl From<OperatorSet> for bindings::OperatorSet {
    fn from(set: OperatorSet) -> Self {
        bindings::OperatorSet {
            avs: set.avs,
            id: set.id,
        }
    }
}

impl From<&Artifact> for bindings::Artifact {
    fn from(artifact: &Artifact) -> Self {
        bindings::Artifact {
            digest: B256::from(artifact.digest),
            registry: artifact.registry.clone(),
        }
    }
}

impl From<bindings::Release> for Release {
    fn from(release: bindings::Release) -> Self {
        Release {
            artifacts: release
                .artifacts
                .into_iter()
                .map(|a| Artifact {
                    registry: a.registry,
                    digest: a.digest.0,
                })
                .collect(),
            upgrade_by_time: release.upgradeByTime,
        }
    }
}

impl From<&Release> for bindings::Release {
    fn from(release: &Release) -> Self {
        bindings::Release {
            artifacts: release.artifacts.iter().map(Into::into).collect(),
            upgradeByTime: release.upgrade_by_time,
        }
    }
}
