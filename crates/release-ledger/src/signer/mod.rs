//! Transaction and message signers.
//!
//! Two credential backends share one capability:
//! - [`EcdsaKeySigner`]: a raw hex-encoded secp256k1 private key
//! - [`KeystoreSigner`]: an encrypted JSON keystore plus password
//!
//! [`signer_from_credentials`] picks the backend from configuration, raw key
//! first. Exclusivity of the two forms is enforced where configuration is
//! edited, not here.

mod ecdsa;
mod factory;
mod keystore;

pub use ecdsa::EcdsaKeySigner;
pub use factory::{signer_from_credentials, SignerCredentials};
pub use keystore::KeystoreSigner;

use alloy::consensus::{SignableTransaction, Signed, TxLegacy};
use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;
use k256::ecdsa::VerifyingKey;

use crate::error::SignerError;

/// Result type for signer operations
pub type SignerResult<T> = std::result::Result<T, SignerError>;

/// Length of an `r || s || v` signature.
pub const SIGNATURE_LEN: usize = 65;

/// Key-holding capability that authorises ledger writes.
pub trait Signer: Send + Sync {
    /// Address derived from the public key.
    fn address(&self) -> Address;

    /// Sign `tx` with an EIP-155 signature bound to `chain_id`.
    ///
    /// The transaction's chain id is overwritten with `chain_id` so the
    /// signature cannot be replayed on another chain.
    fn sign_transaction(&self, tx: TxLegacy, chain_id: u64) -> SignerResult<Signed<TxLegacy>>;

    /// Sign `message` with the EIP-191 personal-message prefix.
    ///
    /// Returns `r || s || v` with `v` in `{27, 28}`.
    fn sign_message(&self, message: &[u8]) -> SignerResult<[u8; SIGNATURE_LEN]>;

    /// Public half of the key.
    fn public_key(&self) -> VerifyingKey;
}

// Both backends end up holding the same key shape; the signing math lives here.

fn sign_legacy(
    key: &PrivateKeySigner,
    mut tx: TxLegacy,
    chain_id: u64,
) -> SignerResult<Signed<TxLegacy>> {
    tx.chain_id = Some(chain_id);
    let signature = key
        .sign_hash_sync(&tx.signature_hash())
        .map_err(|e| SignerError::SigningFailure(e.to_string()))?;
    Ok(tx.into_signed(signature))
}

fn sign_personal_message(
    key: &PrivateKeySigner,
    message: &[u8],
) -> SignerResult<[u8; SIGNATURE_LEN]> {
    let signature = key
        .sign_message_sync(message)
        .map_err(|e| SignerError::SigningFailure(e.to_string()))?;

    let mut out = [0u8; SIGNATURE_LEN];
    out[..32].copy_from_slice(&signature.r().to_be_bytes::<32>());
    out[32..64].copy_from_slice(&signature.s().to_be_bytes::<32>());
    // Verifiers expect the pre-EIP-155 recovery id.
    out[64] = 27 + u8::from(signature.v());
    Ok(out)
}

fn public_key_of(key: &PrivateKeySigner) -> VerifyingKey {
    *key.credential().verifying_key()
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{Signature, TxKind, U256};

    const ANVIL_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn transfer() -> TxLegacy {
        TxLegacy {
            chain_id: None,
            nonce: 0,
            gas_price: 20_000_000_000,
            gas_limit: 21_000,
            to: TxKind::Call(Address::ZERO),
            value: U256::from(1000u64),
            input: Default::default(),
        }
    }

    #[test]
    fn transaction_signature_is_bound_to_chain_id() {
        let signer = EcdsaKeySigner::from_hex(ANVIL_KEY).unwrap();

        let mainnet = signer.sign_transaction(transfer(), 1).unwrap();
        let sepolia = signer.sign_transaction(transfer(), 11_155_111).unwrap();

        assert_eq!(mainnet.tx().chain_id, Some(1));
        assert_eq!(sepolia.tx().chain_id, Some(11_155_111));
        assert_ne!(mainnet.signature_hash(), sepolia.signature_hash());

        let recovered = mainnet
            .signature()
            .recover_address_from_prehash(&mainnet.signature_hash())
            .unwrap();
        assert_eq!(recovered, signer.address());
    }

    #[test]
    fn message_signature_is_65_bytes_with_high_recovery_id() {
        let signer = EcdsaKeySigner::from_hex(ANVIL_KEY).unwrap();
        for message in [&b""[..], b"hello", b"a much longer message to sign for the verifier"] {
            let sig = signer.sign_message(message).unwrap();
            assert_eq!(sig.len(), SIGNATURE_LEN);
            assert!(sig[64] == 27 || sig[64] == 28, "v = {}", sig[64]);
        }
    }

    #[test]
    fn message_signature_recovers_to_signer_address() {
        let signer = EcdsaKeySigner::from_hex(ANVIL_KEY).unwrap();
        let sig = signer.sign_message(b"release 7").unwrap();

        let parsed = Signature::try_from(&sig[..]).unwrap();
        let recovered = parsed.recover_address_from_msg(b"release 7").unwrap();
        assert_eq!(recovered, signer.address());
    }

    #[test]
    fn public_key_matches_address() {
        let signer = EcdsaKeySigner::from_hex(ANVIL_KEY).unwrap();
        let derived = Address::from_public_key(&signer.public_key());
        assert_eq!(derived, signer.address());
    }
}
