//! Release-Ledger: on-chain release manager access for avsctl
//!
//! This crate owns everything that touches the ledger: the typed façade
//! over the release manager contract, the JSON-RPC transport it runs on,
//! and the signers that authorise state-changing transactions.
//!
//! ## Layer 0 - Ledger
//!
//! Focus: correct ABI shapes, replay-protected signing, and error text that
//! preserves the underlying revert reason for the classifier upstream.
//!
//! ## Key Components
//!
//! - `ReleaseLedger`: read/write capability scoped by an `OperatorSet`
//! - `ReleaseManagerClient`: contract-backed implementation over a `LedgerTransport`
//! - `Signer`: raw-key and keystore credential backends
//! - `fakes`: in-memory ledger and scripted transport for tests

pub mod bindings;
pub mod client;
mod error;
pub mod fakes;
pub mod ledger;
pub mod network;
pub mod signer;
pub mod transport;
pub mod types;

pub use alloy::primitives::{Address, TxHash};
pub use client::ReleaseManagerClient;
pub use error::{LedgerError, SignerError, TransportError};
pub use ledger::ReleaseLedger;
pub use network::{chain_name, default_release_manager, resolve_release_manager};
pub use signer::{
    signer_from_credentials, EcdsaKeySigner, KeystoreSigner, Signer, SignerCredentials,
};
pub use transport::{LedgerTransport, RpcTransport};
pub use types::{Artifact, OperatorSet, Release, ReleaseId, TxContext, TxHandle};

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, LedgerError>;
