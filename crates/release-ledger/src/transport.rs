//! Ledger transport: the raw chain capability the release manager client sits on.
//!
//! The trait is deliberately thin (chain id, pending nonce, gas price, raw
//! call, raw submit) so the client's transaction protocol can be exercised
//! against a scripted fake. [`RpcTransport`] is the JSON-RPC implementation.

use alloy::network::{Ethereum, TransactionBuilder};
use alloy::primitives::{Address, Bytes, TxHash};
use alloy::providers::{Provider, RootProvider};
use alloy::rpc::client::RpcClient;
use alloy::rpc::types::TransactionRequest;
use alloy::sol_types::{Panic, SolError};
use alloy::transports::http::{reqwest, Http};
use async_trait::async_trait;
use tracing::debug;

use crate::error::{LedgerError, TransportError};
use crate::Result;

/// Result type for transport calls
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Chain access used by [`crate::ReleaseManagerClient`].
///
/// Implementations must be cancel-safe: dropping a returned future aborts
/// the in-flight request without side effects beyond what the node already
/// accepted.
#[async_trait]
pub trait LedgerTransport: Send + Sync {
    /// Chain id of the connected network.
    async fn chain_id(&self) -> TransportResult<u64>;

    /// Next nonce for `address`, counting pending transactions.
    async fn pending_nonce_at(&self, address: Address) -> TransportResult<u64>;

    /// Node's suggested legacy gas price in wei.
    async fn suggest_gas_price(&self) -> TransportResult<u128>;

    /// Execute a read-only call against `to` and return the raw return data.
    async fn call(&self, to: Address, data: Bytes) -> TransportResult<Bytes>;

    /// Broadcast a signed, EIP-2718 encoded transaction.
    async fn send_raw_transaction(&self, raw: Bytes) -> TransportResult<TxHash>;
}

/// JSON-RPC over HTTP transport.
///
/// The connection lives as long as the value; dropping it releases the
/// underlying HTTP client on every exit path.
pub struct RpcTransport {
    provider: RootProvider<Ethereum>,
    url: String,
}

impl RpcTransport {
    /// Set up a transport for `rpc_url`. No request is made until first use.
    pub fn connect(rpc_url: &str) -> Result<Self> {
        let connection_err = |reason: String| LedgerError::Connection {
            url: rpc_url.to_string(),
            reason,
        };

        let url: reqwest::Url = rpc_url.parse().map_err(|e| connection_err(format!("{e}")))?;
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("avsctl/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| connection_err(e.to_string()))?;

        let is_local = matches!(url.host_str(), Some("localhost" | "127.0.0.1" | "[::1]"));
        let client = RpcClient::new(Http::with_client(http_client, url), is_local);
        debug!(url = rpc_url, is_local, "ledger transport ready");

        Ok(Self {
            provider: RootProvider::new(client),
            url: rpc_url.to_string(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Render an RPC failure, appending the decoded Solidity panic reason when
/// the node returned `Panic(uint256)` revert data without spelling it out.
fn describe(err: &alloy::transports::TransportError) -> String {
    let mut message = err.to_string();
    let panic_kind = err
        .as_error_resp()
        .and_then(|payload| payload.as_revert_data())
        .and_then(|data| Panic::abi_decode(&data).ok())
        .and_then(|panic| panic.kind());

    if let Some(kind) = panic_kind {
        if !message.contains(kind.as_str()) {
            message.push_str(" (panic: ");
            message.push_str(kind.as_str());
            message.push(')');
        }
    }
    message
}

fn rpc_err(err: alloy::transports::TransportError) -> TransportError {
    TransportError::new(describe(&err))
}

#[async_trait]
impl LedgerTransport for RpcTransport {
    async fn chain_id(&self) -> TransportResult<u64> {
        self.provider.get_chain_id().await.map_err(rpc_err)
    }

    async fn pending_nonce_at(&self, address: Address) -> TransportResult<u64> {
        self.provider
            .get_transaction_count(address)
            .pending()
            .await
            .map_err(rpc_err)
    }

    async fn suggest_gas_price(&self) -> TransportResult<u128> {
        self.provider.get_gas_price().await.map_err(rpc_err)
    }

    async fn call(&self, to: Address, data: Bytes) -> TransportResult<Bytes> {
        let request = TransactionRequest::default().with_to(to).with_input(data);
        self.provider.call(request).await.map_err(rpc_err)
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> TransportResult<TxHash> {
        let pending = self
            .provider
            .send_raw_transaction(&raw)
            .await
            .map_err(rpc_err)?;
        Ok(*pending.tx_hash())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_rejects_malformed_url() {
        let err = RpcTransport::connect("not a url").err().unwrap();
        assert!(matches!(err, LedgerError::Connection { .. }));
        assert!(err.to_string().contains("not a url"));
    }

    #[tokio::test]
    async fn connect_is_lazy() {
        let transport = RpcTransport::connect("http://127.0.0.1:1").unwrap();
        assert_eq!(transport.url(), "http://127.0.0.1:1");
    }

    fn reverted_with_panic(code: u8) -> alloy::transports::TransportError {
        use alloy::rpc::json_rpc::{ErrorPayload, RpcError};

        let data = format!("\"0x4e487b71{code:064x}\"");
        RpcError::ErrorResp(ErrorPayload {
            code: 3,
            message: "execution reverted".into(),
            data: Some(serde_json::value::RawValue::from_string(data).unwrap()),
        })
    }

    #[test]
    fn describe_names_the_panic_kind() {
        let underflow = describe(&reverted_with_panic(0x11));
        assert!(underflow.contains("execution reverted"), "{underflow}");
        assert!(underflow.contains("(panic: arithmetic underflow or overflow)"), "{underflow}");

        let out_of_bounds = describe(&reverted_with_panic(0x32));
        assert!(out_of_bounds.contains("(panic: array out-of-bounds access)"), "{out_of_bounds}");
    }

    #[test]
    fn describe_leaves_plain_reverts_alone() {
        use alloy::rpc::json_rpc::{ErrorPayload, RpcError};

        let err: alloy::transports::TransportError = RpcError::ErrorResp(ErrorPayload {
            code: 3,
            message: "execution reverted: no releases".into(),
            data: None,
        });
        let message = describe(&err);
        assert!(message.contains("no releases"), "{message}");
        assert!(!message.contains("panic:"), "{message}");
    }
}
