//! In-memory fakes for the ledger seams (testing only)
//!
//! Provides `MemoryReleaseLedger`, which honours the `ReleaseLedger`
//! contract including the revert messages a real node produces, and
//! `ScriptedTransport`, which lets the client's transaction pipeline run
//! without a node.

use std::collections::HashMap;
use std::sync::Mutex;

use alloy::primitives::{keccak256, Address, Bytes, TxHash};
use alloy::sol_types::SolCall;
use async_trait::async_trait;

use crate::error::{LedgerError, TransportError};
use crate::ledger::ReleaseLedger;
use crate::transport::{LedgerTransport, TransportResult};
use crate::types::{Artifact, OperatorSet, Release, ReleaseId, TxHandle};
use crate::Result;

/// Revert text a node returns for `latest` on an empty release list.
pub const UNDERFLOW_REVERT: &str = "execution reverted: panic: arithmetic underflow or overflow (0x11)";

/// Revert text a node returns for an out-of-range release id.
pub const OUT_OF_BOUNDS_REVERT: &str = "execution reverted: panic: array out-of-bounds access (0x32)";

// ---------------------------------------------------------------------------
// MemoryReleaseLedger
// ---------------------------------------------------------------------------

/// A write accepted by [`MemoryReleaseLedger`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishedWrite {
    Release {
        set: OperatorSet,
        release: Release,
        gas_limit: u64,
    },
    MetadataUri {
        set: OperatorSet,
        uri: String,
        gas_limit: u64,
    },
}

#[derive(Debug, Default)]
struct SetState {
    releases: Vec<Release>,
    metadata_uri: String,
}

#[derive(Debug, Default)]
struct LedgerState {
    sets: HashMap<OperatorSet, SetState>,
    writes: Vec<PublishedWrite>,
    nonce: u64,
    read_failure: Option<String>,
    write_failure: Option<String>,
}

/// In-memory release ledger keyed by operator set.
#[derive(Debug)]
pub struct MemoryReleaseLedger {
    state: Mutex<LedgerState>,
    signer: Option<Address>,
    chain_id: u64,
}

impl Default for MemoryReleaseLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryReleaseLedger {
    /// Ledger that accepts writes from a fixed test address.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LedgerState::default()),
            signer: Some(Address::repeat_byte(0xaa)),
            chain_id: crate::network::LOCAL,
        }
    }

    /// Ledger without a signer; writes fail like an unsigned client.
    pub fn read_only() -> Self {
        Self {
            signer: None,
            ..Self::new()
        }
    }

    /// Seed a release directly, returning its id.
    pub fn insert_release(&self, set: OperatorSet, release: Release) -> ReleaseId {
        let mut state = self.state.lock().unwrap();
        let entry = state.sets.entry(set).or_default();
        entry.releases.push(release);
        (entry.releases.len() - 1) as ReleaseId
    }

    pub fn set_metadata(&self, set: OperatorSet, uri: &str) {
        let mut state = self.state.lock().unwrap();
        state.sets.entry(set).or_default().metadata_uri = uri.to_string();
    }

    /// Make every subsequent read fail with `message`.
    pub fn fail_reads(&self, message: &str) {
        self.state.lock().unwrap().read_failure = Some(message.to_string());
    }

    /// Make every subsequent write fail with `message`.
    pub fn fail_writes(&self, message: &str) {
        self.state.lock().unwrap().write_failure = Some(message.to_string());
    }

    /// Writes accepted so far, in order.
    pub fn writes(&self) -> Vec<PublishedWrite> {
        self.state.lock().unwrap().writes.clone()
    }

    fn check_read(state: &LedgerState, op: &'static str) -> Result<()> {
        match &state.read_failure {
            Some(message) => Err(LedgerError::read(op, TransportError::new(message.clone()))),
            None => Ok(()),
        }
    }

    fn accept_write(
        &self,
        state: &mut LedgerState,
        op: &'static str,
        write: PublishedWrite,
    ) -> Result<TxHandle> {
        let from = self.signer.ok_or(LedgerError::SignerRequired { op })?;
        if let Some(message) = &state.write_failure {
            return Err(LedgerError::write(
                "send transaction",
                TransportError::new(message.clone()),
            ));
        }

        let nonce = state.nonce;
        state.nonce += 1;
        let hash = keccak256(format!("{write:?}/{nonce}").as_bytes());
        state.writes.push(write);

        Ok(TxHandle {
            hash,
            from,
            to: Address::ZERO,
            nonce,
            chain_id: self.chain_id,
        })
    }
}

#[async_trait]
impl ReleaseLedger for MemoryReleaseLedger {
    async fn latest_release(&self, set: OperatorSet) -> Result<(Release, ReleaseId)> {
        let state = self.state.lock().unwrap();
        Self::check_read(&state, "get latest release")?;
        state
            .sets
            .get(&set)
            .and_then(|s| {
                let id = s.releases.len().checked_sub(1)?;
                Some((s.releases[id].clone(), id as ReleaseId))
            })
            .ok_or_else(|| {
                LedgerError::read("get latest release", TransportError::new(UNDERFLOW_REVERT))
            })
    }

    async fn release(&self, set: OperatorSet, id: ReleaseId) -> Result<Release> {
        let state = self.state.lock().unwrap();
        Self::check_read(&state, "get release")?;
        state
            .sets
            .get(&set)
            .and_then(|s| s.releases.get(usize::try_from(id).ok()?))
            .cloned()
            .ok_or_else(|| {
                LedgerError::read("get release", TransportError::new(OUT_OF_BOUNDS_REVERT))
            })
    }

    async fn total_releases(&self, set: OperatorSet) -> Result<u64> {
        let state = self.state.lock().unwrap();
        Self::check_read(&state, "get total releases")?;
        Ok(state.sets.get(&set).map_or(0, |s| s.releases.len() as u64))
    }

    async fn latest_upgrade_by_time(&self, set: OperatorSet) -> Result<u32> {
        let state = self.state.lock().unwrap();
        Self::check_read(&state, "get latest upgrade-by time")?;
        state
            .sets
            .get(&set)
            .and_then(|s| s.releases.last())
            .map(|r| r.upgrade_by_time)
            .ok_or_else(|| {
                LedgerError::read(
                    "get latest upgrade-by time",
                    TransportError::new(UNDERFLOW_REVERT),
                )
            })
    }

    async fn metadata_uri(&self, set: OperatorSet) -> Result<String> {
        let state = self.state.lock().unwrap();
        Self::check_read(&state, "get metadata URI")?;
        Ok(state
            .sets
            .get(&set)
            .map(|s| s.metadata_uri.clone())
            .unwrap_or_default())
    }

    async fn publish_metadata_uri(
        &self,
        set: OperatorSet,
        uri: &str,
        gas_limit: u64,
    ) -> Result<TxHandle> {
        let mut state = self.state.lock().unwrap();
        let handle = self.accept_write(
            &mut state,
            "publishing metadata URI",
            PublishedWrite::MetadataUri {
                set,
                uri: uri.to_string(),
                gas_limit,
            },
        )?;
        state.sets.entry(set).or_default().metadata_uri = uri.to_string();
        Ok(handle)
    }

    async fn publish_release(
        &self,
        set: OperatorSet,
        artifacts: &[Artifact],
        upgrade_by_time: u32,
        gas_limit: u64,
    ) -> Result<TxHandle> {
        let release = Release::new(artifacts.to_vec(), upgrade_by_time);
        let mut state = self.state.lock().unwrap();
        let handle = self.accept_write(
            &mut state,
            "pushing releases",
            PublishedWrite::Release {
                set,
                release: release.clone(),
                gas_limit,
            },
        )?;
        state.sets.entry(set).or_default().releases.push(release);
        Ok(handle)
    }
}

// ---------------------------------------------------------------------------
// ScriptedTransport
// ---------------------------------------------------------------------------

/// One interaction observed by [`ScriptedTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportStep {
    ChainId,
    PendingNonce(Address),
    GasPrice,
    Call { to: Address, selector: [u8; 4] },
    SendRaw,
}

type Scripted<T> = std::result::Result<T, String>;

#[derive(Debug)]
struct Script {
    chain_id: Scripted<u64>,
    nonce: Scripted<u64>,
    gas_price: Scripted<u128>,
    responses: HashMap<[u8; 4], std::result::Result<Bytes, String>>,
    send_failure: Option<String>,
    steps: Vec<TransportStep>,
    sent: Vec<Bytes>,
}

/// Transport that answers from a script and records every interaction.
#[derive(Debug)]
pub struct ScriptedTransport {
    script: Mutex<Script>,
}

impl ScriptedTransport {
    /// Transport on `chain_id` with nonce 0 and a 1 gwei gas price.
    pub fn new(chain_id: u64) -> Self {
        Self {
            script: Mutex::new(Script {
                chain_id: Ok(chain_id),
                nonce: Ok(0),
                gas_price: Ok(1_000_000_000),
                responses: HashMap::new(),
                send_failure: None,
                steps: Vec::new(),
                sent: Vec::new(),
            }),
        }
    }

    pub fn set_nonce(&self, nonce: u64) {
        self.script.lock().unwrap().nonce = Ok(nonce);
    }

    pub fn set_gas_price(&self, gas_price: u128) {
        self.script.lock().unwrap().gas_price = Ok(gas_price);
    }

    pub fn fail_chain_id(&self, message: &str) {
        self.script.lock().unwrap().chain_id = Err(message.to_string());
    }

    pub fn fail_nonce(&self, message: &str) {
        self.script.lock().unwrap().nonce = Err(message.to_string());
    }

    pub fn fail_gas_price(&self, message: &str) {
        self.script.lock().unwrap().gas_price = Err(message.to_string());
    }

    pub fn fail_send(&self, message: &str) {
        self.script.lock().unwrap().send_failure = Some(message.to_string());
    }

    /// Answer calls to `C` with the ABI encoding of `ret`.
    pub fn respond<C: SolCall>(&self, ret: &C::Return) {
        let encoded = Bytes::from(C::abi_encode_returns(ret));
        self.script
            .lock()
            .unwrap()
            .responses
            .insert(C::SELECTOR, Ok(encoded));
    }

    /// Answer calls with `selector` with arbitrary bytes.
    pub fn respond_raw(&self, selector: [u8; 4], data: Bytes) {
        self.script
            .lock()
            .unwrap()
            .responses
            .insert(selector, Ok(data));
    }

    /// Answer calls to `C` with an RPC error carrying `message`.
    pub fn revert<C: SolCall>(&self, message: &str) {
        self.script
            .lock()
            .unwrap()
            .responses
            .insert(C::SELECTOR, Err(message.to_string()));
    }

    /// Interactions so far, in order.
    pub fn steps(&self) -> Vec<TransportStep> {
        self.script.lock().unwrap().steps.clone()
    }

    /// Raw transactions accepted so far.
    pub fn sent(&self) -> Vec<Bytes> {
        self.script.lock().unwrap().sent.clone()
    }
}

#[async_trait]
impl LedgerTransport for ScriptedTransport {
    async fn chain_id(&self) -> TransportResult<u64> {
        let mut script = self.script.lock().unwrap();
        script.steps.push(TransportStep::ChainId);
        script.chain_id.clone().map_err(TransportError::new)
    }

    async fn pending_nonce_at(&self, address: Address) -> TransportResult<u64> {
        let mut script = self.script.lock().unwrap();
        script.steps.push(TransportStep::PendingNonce(address));
        script.nonce.clone().map_err(TransportError::new)
    }

    async fn suggest_gas_price(&self) -> TransportResult<u128> {
        let mut script = self.script.lock().unwrap();
        script.steps.push(TransportStep::GasPrice);
        script.gas_price.clone().map_err(TransportError::new)
    }

    async fn call(&self, to: Address, data: Bytes) -> TransportResult<Bytes> {
        let mut selector = [0u8; 4];
        if data.len() >= 4 {
            selector.copy_from_slice(&data[..4]);
        }
        let mut script = self.script.lock().unwrap();
        script.steps.push(TransportStep::Call { to, selector });
        match script.responses.get(&selector) {
            Some(Ok(bytes)) => Ok(bytes.clone()),
            Some(Err(message)) => Err(TransportError::new(message.clone())),
            None => Err(TransportError::new(format!(
                "no scripted response for selector 0x{}",
                hex::encode(selector)
            ))),
        }
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> TransportResult<TxHash> {
        let mut script = self.script.lock().unwrap();
        script.steps.push(TransportStep::SendRaw);
        if let Some(message) = &script.send_failure {
            return Err(TransportError::new(message.clone()));
        }
        let hash = keccak256(&raw);
        script.sent.push(raw);
        Ok(hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set() -> OperatorSet {
        OperatorSet::new(Address::repeat_byte(0x01), 0)
    }

    #[tokio::test]
    async fn memory_ledger_assigns_sequential_ids() {
        let ledger = MemoryReleaseLedger::new();
        for t in [100, 200, 300] {
            ledger
                .publish_release(set(), &[Artifact::new("r", [1; 32])], t, 500_000)
                .await
                .expect("publish");
        }
        let (latest, id) = ledger.latest_release(set()).await.expect("latest");
        assert_eq!(id, 2);
        assert_eq!(latest.upgrade_by_time, 300);
        assert_eq!(ledger.total_releases(set()).await.unwrap(), 3);
        assert_eq!(ledger.latest_upgrade_by_time(set()).await.unwrap(), 300);
    }

    #[tokio::test]
    async fn memory_ledger_reverts_like_a_node() {
        let ledger = MemoryReleaseLedger::new();
        let latest = ledger.latest_release(set()).await.unwrap_err();
        assert!(latest.read_message().unwrap().contains("arithmetic underflow"));

        ledger.insert_release(set(), Release::default());
        let by_id = ledger.release(set(), 5).await.unwrap_err();
        assert!(by_id.read_message().unwrap().contains("array out-of-bounds"));
    }

    #[tokio::test]
    async fn read_only_ledger_rejects_writes() {
        let ledger = MemoryReleaseLedger::read_only();
        let err = ledger
            .publish_metadata_uri(set(), "https://example.com/m.json", 200_000)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "signer required for publishing metadata URI");
        assert!(ledger.writes().is_empty());
    }

    #[tokio::test]
    async fn scripted_transport_records_steps() {
        let transport = ScriptedTransport::new(31_337);
        transport.fail_nonce("nonce unavailable");

        assert_eq!(transport.chain_id().await.unwrap(), 31_337);
        let err = transport.pending_nonce_at(Address::ZERO).await.unwrap_err();
        assert_eq!(err.message(), "nonce unavailable");
        assert_eq!(
            transport.steps(),
            vec![TransportStep::ChainId, TransportStep::PendingNonce(Address::ZERO)]
        );
    }
}
