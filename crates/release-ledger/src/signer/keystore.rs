use std::path::{Path, PathBuf};

use alloy::consensus::{Signed, TxLegacy};
use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use eth_keystore::KeystoreError;
use k256::ecdsa::VerifyingKey;
use tracing::debug;

use super::{public_key_of, sign_legacy, sign_personal_message, Signer, SignerResult, SIGNATURE_LEN};
use crate::error::SignerError;

/// Signer backed by an encrypted JSON keystore (Web3 Secret Storage).
///
/// The key is decrypted once in [`KeystoreSigner::open`]; the password is
/// not retained.
pub struct KeystoreSigner {
    key: PrivateKeySigner,
    path: PathBuf,
}

impl KeystoreSigner {
    /// Decrypt the keystore at `path` with `password`.
    ///
    /// A missing or unreadable file yields [`SignerError::KeystoreRead`];
    /// a wrong password or malformed keystore yields
    /// [`SignerError::KeystoreDecrypt`].
    pub fn open(path: impl AsRef<Path>, password: &str) -> SignerResult<Self> {
        let path = path.as_ref();
        let secret = eth_keystore::decrypt_key(path, password).map_err(|e| match e {
            KeystoreError::StdIo(reason) => SignerError::KeystoreRead {
                path: path.to_path_buf(),
                source: std::io::Error::other(reason),
            },
            other => SignerError::KeystoreDecrypt {
                path: path.to_path_buf(),
                reason: other.to_string(),
            },
        })?;

        let key = PrivateKeySigner::from_slice(&secret)
            .map_err(|e| SignerError::InvalidPrivateKey(e.to_string()))?;
        debug!(path = %path.display(), address = %key.address(), "keystore unlocked");

        Ok(Self {
            key,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for KeystoreSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeystoreSigner")
            .field("path", &self.path)
            .field("address", &self.key.address())
            .finish_non_exhaustive()
    }
}

impl Signer for KeystoreSigner {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::EcdsaKeySigner;
    use tempfile::TempDir;

    const ANVIL_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn write_keystore(dir: &TempDir, password: &str) -> PathBuf {
        let secret = hex::decode(ANVIL_KEY).expect("hex");
        eth_keystore::encrypt_key(
            dir.path(),
            &mut rand::thread_rng(),
            secret,
            password,
            Some("operator.json"),
        )
        .expect("encrypt keystore");
        dir.path().join("operator.json")
    }

    #[test]
    fn unlocks_to_same_address_as_raw_key() {
        let dir = TempDir::new().expect("tempdir");
        let path = write_keystore(&dir, "hunter2");

        let keystore = KeystoreSigner::open(&path, "hunter2").expect("open");
        let raw = EcdsaKeySigner::from_hex(ANVIL_KEY).expect("raw");

        assert_eq!(keystore.address(), raw.address());
        assert_eq!(keystore.path(), path.as_path());
    }

    #[test]
    fn wrong_password_is_a_decrypt_error() {
        let dir = TempDir::new().expect("tempdir");
        let path = write_keystore(&dir, "correct");

        let err = KeystoreSigner::open(&path, "incorrect").unwrap_err();
        assert!(matches!(err, SignerError::KeystoreDecrypt { .. }), "{err}");
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = TempDir::new().expect("tempdir");
        let err = KeystoreSigner::open(dir.path().join("absent.json"), "pw").unwrap_err();
        assert!(matches!(err, SignerError::KeystoreRead { .. }), "{err}");
    }

    #[test]
    fn garbage_file_is_a_decrypt_error() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("garbage.json");
        std::fs::write(&path, b"{not json").expect("write");

        let err = KeystoreSigner::open(&path, "pw").unwrap_err();
        assert!(matches!(err, SignerError::KeystoreDecrypt { .. }), "{err}");
    }
}
