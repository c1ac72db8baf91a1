//! Error types for release-ledger

use std::path::PathBuf;

use alloy::primitives::Address;
use thiserror::Error;

/// Errors raised while constructing a signer or producing a signature
#[derive(Error, Debug)]
pub enum SignerError {
    /// Raw key material could not be parsed into a secp256k1 scalar
    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    /// Keystore file is missing or unreadable
    #[error("failed to read keystore file {}: {source}", path.display())]
    KeystoreRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Keystore was readable but could not be decrypted (wrong password or corrupt)
    #[error("failed to decrypt keystore {}: {reason}", path.display())]
    KeystoreDecrypt { path: PathBuf, reason: String },

    /// Keystore path configured without a password
    #[error("keystore password is required")]
    MissingKeystorePassword,

    /// Neither credential form is configured
    #[error("no signer configured in context")]
    NoSignerConfigured,

    /// Cryptographic failure while signing
    #[error("signing failed: {0}")]
    SigningFailure(String),

    /// A transaction asked to be signed on behalf of a foreign address
    #[error("unexpected signer address: transaction is from {requested}, signer is {signer}")]
    UnexpectedSignerAddress { requested: Address, signer: Address },
}

/// Failure reported by the JSON-RPC transport, carrying the node's message
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct TransportError(String);

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        TransportError(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

/// Errors that can occur while talking to the release manager
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Could not set up the RPC connection
    #[error("failed to connect to ledger at {url}: {reason}")]
    Connection { url: String, reason: String },

    /// A read-only contract call or chain query failed
    #[error("failed to {op}: {message}")]
    Read { op: &'static str, message: String },

    /// A step of the transaction pipeline (chain id, nonce, gas, submit) failed
    #[error("failed to {op}: {message}")]
    Write { op: &'static str, message: String },

    /// The node answered but the payload did not match the contract ABI
    #[error("failed to decode {op} response: {message}")]
    Decode { op: &'static str, message: String },

    /// Write operation attempted on a client without a signer
    #[error("signer required for {op}")]
    SignerRequired { op: &'static str },

    /// Signing the assembled transaction failed
    #[error("failed to sign transaction: {0}")]
    Signing(#[source] SignerError),

    /// No default release manager is known for this chain
    #[error("no default release manager for chain {chain_id}")]
    UnknownChain { chain_id: u64 },
}

impl LedgerError {
    pub(crate) fn read(op: &'static str, err: TransportError) -> Self {
        LedgerError::Read {
            op,
            message: err.0,
        }
    }

    pub(crate) fn write(op: &'static str, err: TransportError) -> Self {
        LedgerError::Write {
            op,
            message: err.0,
        }
    }

    /// Raw message from the ledger for read failures, used for classification.
    pub fn read_message(&self) -> Option<&str> {
        match self {
            LedgerError::Read { message, .. } => Some(message),
            _ => None,
        }
    }
}
