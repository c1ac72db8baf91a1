//! Per-command ledger target: which operator set, on which RPC endpoint,
//! through which release manager.
//!
//! Flags win over the current context. The release manager may stay
//! unresolved here; the chain default is looked up once connected.

use release_ledger::{Address, OperatorSet};

use crate::config::ContextConfig;
use crate::error::{AvsctlError, Result};

/// Target flags as given on the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetArgs {
    pub avs: Option<String>,
    pub operator_set: Option<u32>,
    pub release_manager: Option<String>,
    pub rpc_url: Option<String>,
}

/// Fully resolved target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub operator_set: OperatorSet,
    pub rpc_url: String,
    /// Explicit release manager; `None` means use the chain default
    pub release_manager: Option<Address>,
}

/// Parse a hex address, naming `what` in the error.
pub fn parse_address(what: &str, value: &str) -> Result<Address> {
    value
        .trim()
        .parse::<Address>()
        .map_err(|e| AvsctlError::InvalidInput(format!("invalid {what} {value:?}: {e}")))
}

fn pick(flag: &Option<String>, context: Option<&Option<String>>) -> Option<String> {
    flag.clone()
        .filter(|v| !v.is_empty())
        .or_else(|| context.and_then(|c| c.clone()).filter(|v| !v.is_empty()))
}

impl TargetArgs {
    pub fn resolve(&self, context: Option<&ContextConfig>) -> Result<Target> {
        let avs = pick(&self.avs, context.map(|c| &c.avs_address)).ok_or_else(|| {
            AvsctlError::Configuration(
                "--avs is required (or set it with `avsctl context set --avs-address <address>`)"
                    .to_string(),
            )
        })?;
        let rpc_url = pick(&self.rpc_url, context.map(|c| &c.rpc_url)).ok_or_else(|| {
            AvsctlError::Configuration(
                "--rpc-url is required (or set it with `avsctl context set --rpc-url <url>`)"
                    .to_string(),
            )
        })?;
        let operator_set_id = self
            .operator_set
            .or_else(|| context.and_then(|c| c.operator_set_id))
            .unwrap_or(0);
        let release_manager = pick(&self.release_manager, context.map(|c| &c.release_manager))
            .map(|rm| parse_address("release manager address", &rm))
            .transpose()?;

        Ok(Target {
            operator_set: OperatorSet::new(parse_address("AVS address", &avs)?, operator_set_id),
            rpc_url,
            release_manager,
        })
    }
}
