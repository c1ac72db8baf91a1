use std::path::PathBuf;
use std::sync::Arc;

use super::{EcdsaKeySigner, KeystoreSigner, Signer, SignerResult};
use crate::error::SignerError;

/// Credential fields as they appear in a CLI context.
///
/// Empty strings are treated the same as absent values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignerCredentials {
    pub private_key: Option<String>,
    pub keystore_path: Option<PathBuf>,
    pub keystore_password: Option<String>,
}

impl SignerCredentials {
    fn private_key(&self) -> Option<&str> {
        self.private_key.as_deref().filter(|k| !k.trim().is_empty())
    }

    fn keystore_path(&self) -> Option<&PathBuf> {
        self.keystore_path
            .as_ref()
            .filter(|p| !p.as_os_str().is_empty())
    }

    fn keystore_password(&self) -> Option<&str> {
        self.keystore_password.as_deref().filter(|p| !p.is_empty())
    }

    /// Whether any credential form is present.
    pub fn is_configured(&self) -> bool {
        self.private_key().is_some() || self.keystore_path().is_some()
    }
}

/// Build a signer from configured credentials.
///
/// A raw private key wins over a keystore. A keystore requires a password.
pub fn signer_from_credentials(credentials: &SignerCredentials) -> SignerResult<Arc<dyn Signer>> {
    if let Some(key) = credentials.private_key() {
        return Ok(Arc::new(EcdsaKeySigner::from_hex(key)?));
    }

    if let Some(path) = credentials.keystore_path() {
        let password = credentials
            .keystore_password()
            .ok_or(SignerError::MissingKeystorePassword)?;
        return Ok(Arc::new(KeystoreSigner::open(path, password)?));
    }

    Err(SignerError::NoSignerConfigured)
}
