//! Known networks and default release manager deployments.

use alloy::primitives::{address, Address};

use crate::error::LedgerError;
use crate::transport::LedgerTransport;
use crate::Result;

pub const ETHEREUM_MAINNET: u64 = 1;
pub const SEPOLIA: u64 = 11_155_111;
pub const LOCAL: u64 = 31_337;
pub const BASE_MAINNET: u64 = 8_453;
pub const BASE_SEPOLIA: u64 = 84_532;

/// Release manager deployed on Sepolia; local devnets fork from it.
const SEPOLIA_RELEASE_MANAGER: Address = address!("d9Cb89F1993292dEC2F973934bC63B0f2A702776");

/// Human-readable chain name.
pub fn chain_name(chain_id: u64) -> String {
    match chain_id {
        ETHEREUM_MAINNET => "Ethereum Mainnet".to_string(),
        SEPOLIA => "Sepolia Testnet".to_string(),
        LOCAL => "Local Network".to_string(),
        BASE_MAINNET => "Base Mainnet".to_string(),
        BASE_SEPOLIA => "Base Sepolia".to_string(),
        other => format!("Chain {other}"),
    }
}

/// Default release manager for `chain_id`.
///
/// Mainnet has no deployment yet and maps to the zero address, which is
/// treated as "unknown" by [`resolve_release_manager`].
pub fn default_release_manager(chain_id: u64) -> Option<Address> {
    match chain_id {
        SEPOLIA | LOCAL => Some(SEPOLIA_RELEASE_MANAGER),
        ETHEREUM_MAINNET => Some(Address::ZERO),
        _ => None,
    }
}

/// Pick the release manager address for a connection.
///
/// An explicit non-zero address wins without touching the network. Otherwise
/// the chain id is queried and the chain's default is used.
pub async fn resolve_release_manager(
    transport: &dyn LedgerTransport,
    explicit: Option<Address>,
) -> Result<Address> {
    if let Some(address) = explicit.filter(|a| !a.is_zero()) {
        return Ok(address);
    }

    let chain_id = transport
        .chain_id()
        .await
        .map_err(|e| LedgerError::read("get chain ID", e))?;

    default_release_manager(chain_id)
        .filter(|a| !a.is_zero())
        .ok_or(LedgerError::UnknownChain { chain_id })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::ScriptedTransport;

    #[test]
    fn names_known_chains() {
        assert_eq!(chain_name(1), "Ethereum Mainnet");
        assert_eq!(chain_name(11_155_111), "Sepolia Testnet");
        assert_eq!(chain_name(31_337), "Local Network");
        assert_eq!(chain_name(8_453), "Base Mainnet");
        assert_eq!(chain_name(84_532), "Base Sepolia");
        assert_eq!(chain_name(42), "Chain 42");
    }

    #[test]
    fn sepolia_and_local_share_a_deployment() {
        assert_eq!(default_release_manager(SEPOLIA), default_release_manager(LOCAL));
        assert_eq!(default_release_manager(ETHEREUM_MAINNET), Some(Address::ZERO));
        assert_eq!(default_release_manager(BASE_MAINNET), None);
    }

    #[tokio::test]
    async fn explicit_address_wins_without_network() {
        let transport = ScriptedTransport::new(SEPOLIA);
        transport.fail_chain_id("unreachable");
        let explicit = Address::repeat_byte(0x77);

        let resolved = resolve_release_manager(&transport, Some(explicit))
            .await
            .expect("explicit");
        assert_eq!(resolved, explicit);
    }

    #[tokio::test]
    async fn zero_address_falls_back_to_chain_default() {
        let transport = ScriptedTransport::new(SEPOLIA);
        let resolved = resolve_release_manager(&transport, Some(Address::ZERO))
            .await
            .expect("default");
        assert_eq!(resolved, SEPOLIA_RELEASE_MANAGER);
    }

    #[tokio::test]
    async fn chain_without_deployment_is_an_error() {
        for chain_id in [ETHEREUM_MAINNET, BASE_SEPOLIA] {
            let transport = ScriptedTransport::new(chain_id);
            let err = resolve_release_manager(&transport, None).await.unwrap_err();
            assert!(matches!(err, LedgerError::UnknownChain { chain_id: c } if c == chain_id));
        }
    }
}
