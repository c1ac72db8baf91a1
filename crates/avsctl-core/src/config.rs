//! Persisted CLI configuration: named contexts and the current-context pointer.
//!
//! Stored as pretty-printed JSON with camelCase keys at
//! `$AVSCTL_HOME/config.json` (default `~/.avsctl/config.json`). A missing
//! file reads as an empty configuration. Saves go through a temporary file
//! in the same directory and an atomic rename; the temporary file is created
//! owner-only, which keeps key material private on unix.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use release_ledger::SignerCredentials;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{AvsctlError, Result};

/// Environment variable overriding the configuration directory.
pub const HOME_ENV: &str = "AVSCTL_HOME";

const DEFAULT_DIR: &str = ".avsctl";
const CONFIG_FILE: &str = "config.json";
const REDACTED: &str = "********";

/// Top-level configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CliConfig {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub current_context: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub contexts: BTreeMap<String, ContextConfig>,
}

/// One named set of defaults for the CLI flags.
///
/// At most one signer form is populated; [`ContextConfig::apply`] keeps it
/// that way.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avs_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator_set_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_manager: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpc_url: Option<String>,
    /// Container name prefix
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environment_vars: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ecdsa_private_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keystore_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keystore_password: Option<String>,
}

/// Partial update for the current context (`context set`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextUpdate {
    pub avs_address: Option<String>,
    pub operator_set_id: Option<u32>,
    pub release_manager: Option<String>,
    pub rpc_url: Option<String>,
    pub name: Option<String>,
    /// `KEY=VALUE` pairs merged into the context environment
    pub env: Vec<String>,
    pub ecdsa_private_key: Option<String>,
    pub keystore_path: Option<PathBuf>,
    pub keystore_password: Option<String>,
}

/// Split `KEY=VALUE`. The value may itself contain `=`.
pub fn parse_env_pair(pair: &str) -> Result<(String, String)> {
    match pair.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(AvsctlError::InvalidInput(format!(
            "invalid env format: {pair} (expected KEY=VALUE)"
        ))),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

impl ContextConfig {
    /// Apply `update`, returning the names of the fields that changed.
    ///
    /// Setting a private key clears the keystore; setting a keystore path
    /// clears the private key. A password needs a keystore path (already
    /// present or set in the same update). An update with no values is
    /// rejected.
    pub fn apply(&mut self, update: ContextUpdate) -> Result<Vec<&'static str>> {
        let mut changed = Vec::new();

        let env = update
            .env
            .iter()
            .map(|pair| parse_env_pair(pair))
            .collect::<Result<Vec<_>>>()?;

        if let Some(avs) = non_empty(update.avs_address) {
            self.avs_address = Some(avs);
            changed.push("avs-address");
        }
        if let Some(id) = update.operator_set_id {
            self.operator_set_id = Some(id);
            changed.push("operator-set-id");
        }
        if let Some(url) = non_empty(update.rpc_url) {
            self.rpc_url = Some(url);
            changed.push("rpc-url");
        }
        if let Some(rm) = non_empty(update.release_manager) {
            self.release_manager = Some(rm);
            changed.push("release-manager");
        }
        if let Some(name) = non_empty(update.name) {
            self.name = Some(name);
            changed.push("name");
        }
        if !env.is_empty() {
            self.environment_vars.extend(env);
            changed.push("env");
        }

        if let Some(key) = non_empty(update.ecdsa_private_key) {
            self.ecdsa_private_key = Some(key);
            self.keystore_path = None;
            self.keystore_password = None;
            changed.push("ecdsa-private-key");
        }
        if let Some(path) = update.keystore_path.filter(|p| !p.as_os_str().is_empty()) {
            // A password belongs to one keystore file.
            self.keystore_path = Some(path);
            self.keystore_password = None;
            self.ecdsa_private_key = None;
            changed.push("keystore-path");
        }
        if let Some(password) = non_empty(update.keystore_password) {
            if self.keystore_path.is_none() {
                return Err(AvsctlError::InvalidInput(
                    "keystore-password requires keystore-path to be set".to_string(),
                ));
            }
            self.keystore_password = Some(password);
            changed.push("keystore-password");
        }

        if changed.is_empty() {
            return Err(AvsctlError::InvalidInput(
                "no values provided to update".to_string(),
            ));
        }
        Ok(changed)
    }

    pub fn signer_credentials(&self) -> SignerCredentials {
        SignerCredentials {
            private_key: self.ecdsa_private_key.clone(),
            keystore_path: self.keystore_path.clone(),
            keystore_password: self.keystore_password.clone(),
        }
    }

    /// Copy safe to print: key material and passwords are masked.
    pub fn redacted(&self) -> ContextConfig {
        let mask = |v: &Option<String>| v.as_ref().map(|_| REDACTED.to_string());
        ContextConfig {
            ecdsa_private_key: mask(&self.ecdsa_private_key),
            keystore_password: mask(&self.keystore_password),
            ..self.clone()
        }
    }
}

impl CliConfig {
    /// Name and contents of the current context.
    pub fn current(&self) -> Result<(&str, &ContextConfig)> {
        if self.current_context.is_empty() {
            return Err(AvsctlError::Configuration(
                "no current context set; run `avsctl context create --name <name> --use`".to_string(),
            ));
        }
        self.contexts
            .get_key_value(&self.current_context)
            .map(|(name, ctx)| (name.as_str(), ctx))
            .ok_or_else(|| {
                AvsctlError::Configuration(format!(
                    "current context '{}' not found",
                    self.current_context
                ))
            })
    }

    pub fn current_mut(&mut self) -> Result<&mut ContextConfig> {
        self.current()?;
        self.contexts
            .get_mut(&self.current_context)
            .ok_or_else(|| AvsctlError::Configuration("current context vanished".to_string()))
    }

    /// Current context if one is set and exists.
    pub fn current_or_none(&self) -> Option<&ContextConfig> {
        self.current().ok().map(|(_, ctx)| ctx)
    }

    /// Add a context. The first context becomes current automatically.
    pub fn create(&mut self, name: &str, context: ContextConfig, make_current: bool) -> Result<()> {
        if name.is_empty() {
            return Err(AvsctlError::InvalidInput("context name must not be empty".to_string()));
        }
        if self.contexts.contains_key(name) {
            return Err(AvsctlError::InvalidInput(format!("context '{name}' already exists")));
        }
        self.contexts.insert(name.to_string(), context);
        if make_current || self.current_context.is_empty() {
            self.current_context = name.to_string();
        }
        Ok(())
    }

    pub fn use_context(&mut self, name: &str) -> Result<()> {
        if !self.contexts.contains_key(name) {
            return Err(AvsctlError::InvalidInput(format!("context '{name}' not found")));
        }
        self.current_context = name.to_string();
        Ok(())
    }

    /// Remove a context; deleting the current one leaves no current context.
    pub fn delete(&mut self, name: &str) -> Result<()> {
        if self.contexts.remove(name).is_none() {
            return Err(AvsctlError::InvalidInput(format!("context '{name}' not found")));
        }
        if self.current_context == name {
            self.current_context.clear();
        }
        Ok(())
    }
}

/// Location of the configuration file.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `$AVSCTL_HOME/config.json`, else `~/.avsctl/config.json`.
    pub fn from_env() -> Result<Self> {
        let home = std::env::var_os(HOME_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        let user_home = directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf());
        Self::locate(home, user_home)
    }

    fn locate(avsctl_home: Option<PathBuf>, user_home: Option<PathBuf>) -> Result<Self> {
        let dir = match (avsctl_home, user_home) {
            (Some(dir), _) => dir,
            (None, Some(home)) => home.join(DEFAULT_DIR),
            (None, None) => {
                return Err(AvsctlError::Configuration(format!(
                    "cannot determine home directory; set {HOME_ENV}"
                )))
            }
        };
        Ok(Self::new(dir.join(CONFIG_FILE)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: std::io::Error) -> AvsctlError {
        AvsctlError::ConfigFile {
            path: self.path.clone(),
            source,
        }
    }

    pub fn load(&self) -> Result<CliConfig> {
        let data = match std::fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no config file, using empty config");
                return Ok(CliConfig::default());
            }
            Err(e) => return Err(self.io_err(e)),
        };
        serde_json::from_slice(&data).map_err(|source| AvsctlError::ConfigFormat {
            path: self.path.clone(),
            source,
        })
    }

    pub fn save(&self, config: &CliConfig) -> Result<()> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir).map_err(|e| self.io_err(e))?;

        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| self.io_err(e))?;
        serde_json::to_writer_pretty(&mut tmp, config).map_err(|source| {
            AvsctlError::ConfigFormat {
                path: self.path.clone(),
                source,
            }
        })?;
        tmp.write_all(b"\n").map_err(|e| self.io_err(e))?;
        tmp.persist(&self.path).map_err(|e| self.io_err(e.error))?;

        debug!(path = %self.path.display(), "config saved");
        Ok(())
    }

    /// Load, mutate and save in one step.
    pub fn update<T>(&self, f: impl FnOnce(&mut CliConfig) -> Result<T>) -> Result<T> {
        let mut config = self.load()?;
        let out = f(&mut config)?;
        self.save(&config)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> ConfigStore {
        ConfigStore::new(dir.path().join("nested").join("config.json"))
    }

    #[test]
    fn missing_file_is_empty_config() {
        let dir = TempDir::new().unwrap();
        assert_eq!(store(&dir).load().unwrap(), CliConfig::default());
    }

    #[test]
    fn save_then_load_uses_camel_case() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let mut config = CliConfig::default();
        config
            .create(
                "devnet",
                ContextConfig {
                    avs_address: Some("0x1111111111111111111111111111111111111111".to_string()),
                    operator_set_id: Some(0),
                    rpc_url: Some("http://localhost:8545".to_string()),
                    ..Default::default()
                },
                true,
            )
            .unwrap();
        store.save(&config).unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\"currentContext\": \"devnet\""));
        assert!(raw.contains("\"avsAddress\""));
        assert!(raw.contains("\"operatorSetId\": 0"));
        assert!(!raw.contains("keystorePath"));

        assert_eq!(store.load().unwrap(), config);
    }

    #[test]
    fn reads_foreign_written_document() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(
            store.path(),
            r#"{"currentContext":"a","contexts":{"a":{"rpcUrl":"http://x","environmentVars":{"K":"V"},"keystorePath":"/k.json","keystorePassword":"pw"}}}"#,
        )
        .unwrap();

        let config = store.load().unwrap();
        let (name, ctx) = config.current().unwrap();
        assert_eq!(name, "a");
        assert_eq!(ctx.environment_vars["K"], "V");
        assert_eq!(ctx.signer_credentials().keystore_password.as_deref(), Some("pw"));
    }

    #[test]
    fn corrupt_file_is_a_format_error() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), "{").unwrap();
        assert!(matches!(store.load().unwrap_err(), AvsctlError::ConfigFormat { .. }));
    }

    #[test]
    fn private_key_clears_keystore_and_back() {
        let mut ctx = ContextConfig {
            keystore_path: Some(PathBuf::from("/k.json")),
            keystore_password: Some("pw".to_string()),
            ..Default::default()
        };
        ctx.apply(ContextUpdate {
            ecdsa_private_key: Some("0xabc".to_string()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(ctx.ecdsa_private_key.as_deref(), Some("0xabc"));
        assert!(ctx.keystore_path.is_none());
        assert!(ctx.keystore_password.is_none());

        ctx.apply(ContextUpdate {
            keystore_path: Some(PathBuf::from("/other.json")),
            keystore_password: Some("pw2".to_string()),
            ..Default::default()
        })
        .unwrap();
        assert!(ctx.ecdsa_private_key.is_none());
        assert_eq!(ctx.keystore_password.as_deref(), Some("pw2"));
    }

    #[test]
    fn new_keystore_path_drops_the_old_password() {
        let mut ctx = ContextConfig {
            keystore_path: Some(PathBuf::from("/k.json")),
            keystore_password: Some("pw".to_string()),
            ..Default::default()
        };
        ctx.apply(ContextUpdate {
            keystore_path: Some(PathBuf::from("/rotated.json")),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(ctx.keystore_path.as_deref(), Some(Path::new("/rotated.json")));
        assert!(ctx.keystore_password.is_none());

        ctx.apply(ContextUpdate {
            keystore_password: Some("pw3".to_string()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(ctx.keystore_path.as_deref(), Some(Path::new("/rotated.json")));
        assert_eq!(ctx.keystore_password.as_deref(), Some("pw3"));
    }

    #[test]
    fn password_without_keystore_is_rejected() {
        let mut ctx = ContextConfig::default();
        let err = ctx
            .apply(ContextUpdate {
                keystore_password: Some("pw".to_string()),
                ..Default::default()
            })
            .unwrap_err();
        assert!(err.to_string().contains("requires keystore-path"));
    }

    #[test]
    fn empty_update_is_rejected() {
        let mut ctx = ContextConfig::default();
        let err = ctx.apply(ContextUpdate::default()).unwrap_err();
        assert!(err.to_string().contains("no values provided"));
    }

    #[test]
    fn env_pairs_merge_and_validate() {
        let mut ctx = ContextConfig::default();
        let changed = ctx
            .apply(ContextUpdate {
                env: vec!["A=1".to_string(), "URL=http://x?a=b".to_string()],
                operator_set_id: Some(3),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(changed, vec!["operator-set-id", "env"]);
        assert_eq!(ctx.environment_vars["URL"], "http://x?a=b");

        let err = ctx
            .apply(ContextUpdate {
                env: vec!["NOEQUALS".to_string()],
                ..Default::default()
            })
            .unwrap_err();
        assert!(err.to_string().contains("expected KEY=VALUE"));
        assert!(parse_env_pair("=v").is_err());
    }

    #[test]
    fn redaction_masks_secrets_only() {
        let ctx = ContextConfig {
            rpc_url: Some("http://x".to_string()),
            ecdsa_private_key: Some("0xsecret".to_string()),
            ..Default::default()
        };
        let shown = ctx.redacted();
        assert_eq!(shown.ecdsa_private_key.as_deref(), Some(REDACTED));
        assert_eq!(shown.rpc_url, ctx.rpc_url);
        assert!(shown.keystore_password.is_none());
    }

    #[test]
    fn context_lifecycle() {
        let mut config = CliConfig::default();
        config.create("a", ContextConfig::default(), false).unwrap();
        assert_eq!(config.current_context, "a");
        config.create("b", ContextConfig::default(), false).unwrap();
        assert_eq!(config.current_context, "a");
        assert!(config.create("b", ContextConfig::default(), false).is_err());

        config.use_context("b").unwrap();
        assert_eq!(config.current().unwrap().0, "b");
        assert!(config.use_context("missing").is_err());

        config.delete("b").unwrap();
        assert!(config.current().is_err());
        assert!(config.current_or_none().is_none());
    }

    #[test]
    fn locate_prefers_avsctl_home() {
        let explicit = ConfigStore::locate(Some("/opt/avsctl".into()), Some("/home/u".into())).unwrap();
        assert_eq!(explicit.path(), Path::new("/opt/avsctl/config.json"));

        let default = ConfigStore::locate(None, Some("/home/u".into())).unwrap();
        assert_eq!(default.path(), Path::new("/home/u/.avsctl/config.json"));

        assert!(ConfigStore::locate(None, None).is_err());
    }
}
