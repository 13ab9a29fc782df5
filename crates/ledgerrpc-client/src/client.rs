//! The high-level client facade.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value;

use ledgerrpc_core::error::{SignError, StreamError};
use ledgerrpc_core::event::EventFilter;
use ledgerrpc_core::signer::{canonical_bytes, Signer};
use ledgerrpc_core::transaction::{LedgerHash, SignedTransaction, TransactionPayload};
use ledgerrpc_core::transport::{ChannelOpener, Transport};
use ledgerrpc_http::{HttpTransport, HttpTransportConfig, LedgerApi, QueryClient};
use ledgerrpc_ws::{BlockStream, EventStream, WsConnector};

/// Configuration for [`LedgerClient::new`].
#[derive(Debug, Clone)]
pub struct LedgerClientConfig {
    /// HTTP base URL, e.g. `http://localhost:8080`.
    pub http_url: String,
    /// Duplex-channel base URL, e.g. `ws://localhost:8081`.
    pub ws_url: String,
    /// Chain identifier transactions are addressed to.
    pub chain_id: String,
    /// HTTP transport tuning.
    pub http: HttpTransportConfig,
}

/// High-level client for one ledger service, acting as one authority.
///
/// Cheap to clone; engine instances created from it are fully
/// independent of each other.
#[derive(Clone)]
pub struct LedgerClient {
    opener: Arc<dyn ChannelOpener>,
    signer: Arc<dyn Signer>,
    chain_id: String,
    api: LedgerApi,
    queries: QueryClient,
}

impl LedgerClient {
    /// Build a client over the default HTTP/WebSocket transports.
    pub fn new(config: LedgerClientConfig, signer: Arc<dyn Signer>) -> Self {
        let transport: Arc<dyn Transport> =
            Arc::new(HttpTransport::new(config.http_url, config.http));
        let opener: Arc<dyn ChannelOpener> = Arc::new(WsConnector::new(config.ws_url));
        Self::from_parts(transport, opener, signer, config.chain_id)
    }

    /// Build a client from injected transports. This is the seam the
    /// tests use; production code normally goes through [`new`](Self::new).
    pub fn from_parts(
        transport: Arc<dyn Transport>,
        opener: Arc<dyn ChannelOpener>,
        signer: Arc<dyn Signer>,
        chain_id: impl Into<String>,
    ) -> Self {
        let api = LedgerApi::new(Arc::clone(&transport));
        let queries = QueryClient::new(transport, Arc::clone(&signer));
        Self {
            opener,
            signer,
            chain_id: chain_id.into(),
            api,
            queries,
        }
    }

    /// One-shot endpoints: status, config, metrics, schema.
    pub fn api(&self) -> &LedgerApi {
        &self.api
    }

    /// Signed query access: cursors, singular queries, policies.
    pub fn queries(&self) -> &QueryClient {
        &self.queries
    }

    /// Subscribe to the pull-based block stream starting at
    /// `from_height`.
    pub async fn blocks(&self, from_height: u64) -> Result<BlockStream, StreamError> {
        BlockStream::subscribe(&*self.opener, from_height).await
    }

    /// Subscribe to the push-based event stream.
    pub async fn events(&self, filters: EventFilter) -> Result<EventStream, StreamError> {
        EventStream::open(&*self.opener, filters).await
    }

    /// Build and sign a transaction as this client's authority.
    pub fn build_transaction(
        &self,
        instructions: Vec<Value>,
        time_to_live_ms: Option<u64>,
    ) -> Result<SignedTransaction, SignError> {
        let payload = TransactionPayload {
            chain_id: self.chain_id.clone(),
            authority: self.signer.public_key(),
            instructions,
            created_at_ms: now_ms(),
            time_to_live_ms,
        };
        let bytes = canonical_bytes(&payload)?;
        Ok(SignedTransaction {
            hash: LedgerHash::of_bytes(&bytes),
            signature: self.signer.sign(&bytes),
            payload,
        })
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgerrpc_core::signer::{self, Ed25519Signer};

    #[test]
    fn built_transactions_are_signed_over_the_hashed_payload() {
        use async_trait::async_trait;
        use ledgerrpc_core::error::TransportError;
        use ledgerrpc_core::transport::{DuplexConnection, Endpoint};

        struct NullTransport;

        #[async_trait]
        impl Transport for NullTransport {
            async fn post(&self, _: Endpoint, _: Value) -> Result<Value, TransportError> {
                Ok(Value::Null)
            }
            async fn get(&self, _: Endpoint) -> Result<Value, TransportError> {
                Ok(Value::Null)
            }
            fn url(&self) -> &str {
                "mock://ledger"
            }
        }

        struct NullOpener;

        #[async_trait]
        impl ChannelOpener for NullOpener {
            async fn open(
                &self,
                _: Endpoint,
            ) -> Result<Box<dyn DuplexConnection>, TransportError> {
                Err(TransportError::Channel("not wired".into()))
            }
        }

        let client = LedgerClient::from_parts(
            Arc::new(NullTransport),
            Arc::new(NullOpener),
            Arc::new(Ed25519Signer::from_seed([3u8; 32])),
            "test-chain",
        );

        let tx = client
            .build_transaction(vec![serde_json::json!({"mint": 5})], Some(60_000))
            .unwrap();

        assert_eq!(tx.payload.chain_id, "test-chain");
        let bytes = canonical_bytes(&tx.payload).unwrap();
        assert_eq!(tx.hash, LedgerHash::of_bytes(&bytes));
        signer::verify(&tx.payload.authority, &bytes, &tx.signature).unwrap();
    }
}
