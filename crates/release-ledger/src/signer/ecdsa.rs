use alloy::consensus::{Signed, TxLegacy};
use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use k256::ecdsa::VerifyingKey;

use super::{public_key_of, sign_legacy, sign_personal_message, Signer, SignerResult, SIGNATURE_LEN};
use crate::error::SignerError;

/// Signer backed by a raw secp256k1 private key.
#[derive(Clone)]
pub struct EcdsaKeySigner {
    key: PrivateKeySigner,
}

impl EcdsaKeySigner {
    /// Parse a hex private key, with or without a `0x` prefix.
    pub fn from_hex(private_key: &str) -> SignerResult<Self> {
        let trimmed = private_key.trim();
        let hex_part = trimmed.strip_prefix("0x").unwrap_or(trimmed);

        let bytes = hex::decode(hex_part)
            .map_err(|e| SignerError::InvalidPrivateKey(format!("not hex: {e}")))?;
        if bytes.len() != 32 {
            return Err(SignerError::InvalidPrivateKey(format!(
                "expected 32 bytes, got {}",
                bytes.len()
            )));
        }

        let key = PrivateKeySigner::from_slice(&bytes)
            .map_err(|e| SignerError::InvalidPrivateKey(e.to_string()))?;
        Ok(Self { key })
    }
}

// Never print key material.
impl std::fmt::Debug for EcdsaKeySigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EcdsaKeySigner")
            .field("address", &self.key.address())
            .finish_non_exhaustive()
    }
}

impl Signer for EcdsaKeySigner {
    fn address(&self) -> Address {
        self.key.address()
    }

    fn sign_transaction(&self, tx: TxLegacy, chain_id: u64) -> SignerResult<Signed<TxLegacy>> {
        sign_legacy(&self.key, tx, chain_id)
    }

    fn sign_message(&self, message: &[u8]) -> SignerResult<[u8; SIGNATURE_LEN]> {
        sign_personal_message(&self.key, message)
    }

    fn public_key(&self) -> VerifyingKey {
        public_key_of(&self.key)
    }
}
