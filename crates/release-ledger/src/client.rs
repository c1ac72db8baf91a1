//! Release manager contract client.
//!
//! Reads are `eth_call`s decoded against the contract ABI. Writes follow a
//! fixed pipeline: chain id, pending nonce, gas price, signer check, sign,
//! submit. The handle is returned as soon as the node accepts the
//! transaction; inclusion is not awaited.

use std::sync::Arc;

use alloy::consensus::{TxEnvelope, TxLegacy};
use alloy::eips::Encodable2718;
use alloy::primitives::{Address, Bytes, TxKind, U256};
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use tracing::{debug, info, instrument};

use crate::bindings::IReleaseManager;
use crate::error::LedgerError;
use crate::ledger::ReleaseLedger;
use crate::signer::Signer;
use crate::transport::LedgerTransport;
use crate::types::{Artifact, OperatorSet, Release, ReleaseId, TxContext, TxHandle};
use crate::Result;

/// Typed façade over the release manager at a fixed contract address.
pub struct ReleaseManagerClient<T> {
    transport: T,
    contract: Address,
    signer: Option<Arc<dyn Signer>>,
}

impl<T: LedgerTransport> ReleaseManagerClient<T> {
    /// Read-only client. Write operations fail with
    /// [`LedgerError::SignerRequired`] until a signer is attached.
    pub fn new(transport: T, contract: Address) -> Self {
        Self {
            transport,
            contract,
            signer: None,
        }
    }

    /// Attach the signer used for write operations.
    pub fn with_signer(mut self, signer: Arc<dyn Signer>) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn contract(&self) -> Address {
        self.contract
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn signer_address(&self) -> Option<Address> {
        self.signer.as_ref().map(|s| s.address())
    }

    async fn read<C: SolCall + Send>(&self, op: &'static str, call: C) -> Result<C::Return> {
        let data = Bytes::from(call.abi_encode());
        let raw = self
            .transport
            .call(self.contract, data)
            .await
            .map_err(|e| LedgerError::read(op, e))?;
        C::abi_decode_returns(&raw).map_err(|e| LedgerError::Decode {
            op,
            message: e.to_string(),
        })
    }

    /// Build, sign and submit a call to the contract.
    async fn transact(
        &self,
        op: &'static str,
        calldata: Vec<u8>,
        gas_limit: u64,
    ) -> Result<TxHandle> {
        let signer = self
            .signer
            .as_ref()
            .ok_or(LedgerError::SignerRequired { op })?;
        let from = signer.address();

        let chain_id = self
            .transport
            .chain_id()
            .await
            .map_err(|e| LedgerError::write("get chain ID", e))?;
        let nonce = self
            .transport
            .pending_nonce_at(from)
            .await
            .map_err(|e| LedgerError::write("get nonce", e))?;
        let gas_price = self
            .transport
            .suggest_gas_price()
            .await
            .map_err(|e| LedgerError::write("get gas price", e))?;

        let ctx = TxContext {
            chain_id,
            nonce,
            gas_limit,
            gas_price,
            from,
        };
        ctx.authorize(signer.as_ref()).map_err(LedgerError::Signing)?;
        debug!(chain_id, nonce, gas_limit, gas_price, %from, "transaction context ready");

        let tx = TxLegacy {
            chain_id: Some(ctx.chain_id),
            nonce: ctx.nonce,
            gas_price: ctx.gas_price,
            gas_limit: ctx.gas_limit,
            to: TxKind::Call(self.contract),
            value: U256::ZERO,
            input: calldata.into(),
        };
        let signed = signer
            .sign_transaction(tx, ctx.chain_id)
            .map_err(LedgerError::Signing)?;
        let raw = TxEnvelope::from(signed).encoded_2718();

        let hash = self
            .transport
            .send_raw_transaction(raw.into())
            .await
            .map_err(|e| LedgerError::write("send transaction", e))?;
        info!(%hash, %from, nonce, "{op} transaction submitted");

        Ok(TxHandle {
            hash,
            from,
            to: self.contract,
            nonce,
            chain_id,
        })
    }
}

fn to_u64(op: &'static str, value: U256) -> Result<u64> {
    u64::try_from(value).map_err(|_| LedgerError::Decode {
        op,
        message: format!("value {value} does not fit in u64"),
    })
}

#[async_trait]
impl<T: LedgerTransport> ReleaseLedger for ReleaseManagerClient<T> {
    #[instrument(skip_all, fields(contract = %self.contract, operator_set = %set))]
    async fn latest_release(&self, set: OperatorSet) -> Result<(Release, ReleaseId)> {
        let out = self
            .read(
                "get latest release",
                IReleaseManager::getLatestReleaseCall {
                    operatorSet: set.into(),
                },
            )
            .await?;
        let id = to_u64("get latest release", out.releaseId)?;
        Ok((out.release.into(), id))
    }

    #[instrument(skip_all, fields(contract = %self.contract, operator_set = %set))]
    async fn release(&self, set: OperatorSet, id: ReleaseId) -> Result<Release> {
        let release = self
            .read(
                "get release",
                IReleaseManager::getReleaseCall {
                    operatorSet: set.into(),
                    releaseId: U256::from(id),
                },
            )
            .await?;
        Ok(release.into())
    }

    async fn total_releases(&self, set: OperatorSet) -> Result<u64> {
        let total = self
            .read(
                "get total releases",
                IReleaseManager::getTotalReleasesCall {
                    operatorSet: set.into(),
                },
            )
            .await?;
        to_u64("get total releases", total)
    }

    async fn latest_upgrade_by_time(&self, set: OperatorSet) -> Result<u32> {
        self.read(
            "get latest upgrade-by time",
            IReleaseManager::getLatestUpgradeByTimeCall {
                operatorSet: set.into(),
            },
        )
        .await
    }

    async fn metadata_uri(&self, set: OperatorSet) -> Result<String> {
        self.read(
            "get metadata URI",
            IReleaseManager::getMetadataURICall {
                operatorSet: set.into(),
            },
        )
        .await
    }

    #[instrument(skip_all, fields(contract = %self.contract, operator_set = %set))]
    async fn publish_metadata_uri(
        &self,
        set: OperatorSet,
        uri: &str,
        gas_limit: u64,
    ) -> Result<TxHandle> {
        let call = IReleaseManager::publishMetadataURICall {
            operatorSet: set.into(),
            metadataURI: uri.to_string(),
        };
        self.transact("publishing metadata URI", call.abi_encode(), gas_limit)
            .await
    }

    #[instrument(skip_all, fields(contract = %self.contract, operator_set = %set, artifacts = artifacts.len()))]
    async fn publish_release(
        &self,
        set: OperatorSet,
        artifacts: &[Artifact],
        upgrade_by_time: u32,
        gas_limit: u64,
    ) -> Result<TxHandle> {
        let release = Release::new(artifacts.to_vec(), upgrade_by_time);
        let call = IReleaseManager::publishReleaseCall {
            operatorSet: set.into(),
            release: (&release).into(),
        };
        self.transact("pushing releases", call.abi_encode(), gas_limit)
            .await
    }
}
