//! One-shot endpoint wiring: node status, config, metrics, schema and
//! transaction submission. Plain request/response — no protocol state.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use ledgerrpc_core::error::TransportError;
use ledgerrpc_core::transaction::SignedTransaction;
use ledgerrpc_core::transport::{self, Endpoint, Transport};

/// Node status summary from `GET /status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeStatus {
    /// Height of the latest committed block.
    pub height: u64,
    /// Connected peer count.
    pub peers: u32,
    /// Node uptime in milliseconds.
    pub uptime_ms: u64,
}

/// Node configuration from `GET /config`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Chain identifier the node serves.
    pub chain_id: String,
    /// Default transaction time-to-live, milliseconds.
    pub transaction_ttl_ms: u64,
    /// Server-side cursor idle timeout, milliseconds. Abandoned query
    /// cursors are reclaimed after this long.
    pub cursor_idle_timeout_ms: u64,
}

/// Node metrics from `GET /metrics`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeMetrics {
    pub blocks_committed: u64,
    pub transactions_approved: u64,
    pub transactions_rejected: u64,
    /// Current transaction queue depth.
    pub queue_size: u64,
}

/// Typed access to the service's one-shot endpoints.
#[derive(Clone)]
pub struct LedgerApi {
    transport: Arc<dyn Transport>,
}

impl LedgerApi {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub async fn status(&self) -> Result<NodeStatus, TransportError> {
        transport::get_as(&*self.transport, Endpoint::Status).await
    }

    pub async fn config(&self) -> Result<NodeConfig, TransportError> {
        transport::get_as(&*self.transport, Endpoint::Config).await
    }

    pub async fn metrics(&self) -> Result<NodeMetrics, TransportError> {
        transport::get_as(&*self.transport, Endpoint::Metrics).await
    }

    /// Raw data-model schema. Passed through undecoded — the schema
    /// describes the codec, it is not interpreted here.
    pub async fn schema(&self) -> Result<Value, TransportError> {
        self.transport.get(Endpoint::Schema).await
    }

    /// Submit a signed transaction. A success here means
    /// accepted-for-processing only, not committed; confirmation is the
    /// event stream's job.
    pub async fn submit_transaction(&self, tx: &SignedTransaction) -> Result<(), TransportError> {
        let body = serde_json::to_value(tx).map_err(TransportError::Deserialization)?;
        self.transport.post(Endpoint::Transaction, body).await?;
        tracing::debug!(hash = %tx.hash, "transaction accepted for processing");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;

    struct OneShotTransport {
        posts: Mutex<Vec<(Endpoint, Value)>>,
    }

    #[async_trait]
    impl Transport for OneShotTransport {
        async fn post(&self, endpoint: Endpoint, body: Value) -> Result<Value, TransportError> {
            self.posts.lock().unwrap().push((endpoint, body));
            Ok(Value::Null)
        }

        async fn get(&self, endpoint: Endpoint) -> Result<Value, TransportError> {
            Ok(match endpoint {
                Endpoint::Status => json!({"height": 12, "peers": 3, "uptime_ms": 5000}),
                Endpoint::Config => json!({
                    "chain_id": "test-chain",
                    "transaction_ttl_ms": 60000,
                    "cursor_idle_timeout_ms": 30000,
                }),
                _ => Value::Null,
            })
        }

        fn url(&self) -> &str {
            "mock://ledger"
        }
    }

    #[tokio::test]
    async fn status_and_config_decode() {
        let api = LedgerApi::new(Arc::new(OneShotTransport {
            posts: Mutex::new(Vec::new()),
        }));

        let status = api.status().await.unwrap();
        assert_eq!(status.height, 12);

        let config = api.config().await.unwrap();
        assert_eq!(config.chain_id, "test-chain");
    }

    #[tokio::test]
    async fn submit_posts_to_the_transaction_endpoint() {
        use ledgerrpc_core::transaction::{LedgerHash, TransactionPayload};

        let transport = Arc::new(OneShotTransport {
            posts: Mutex::new(Vec::new()),
        });
        let api = LedgerApi::new(Arc::clone(&transport) as Arc<dyn Transport>);

        let tx = SignedTransaction {
            hash: LedgerHash::from("cafe"),
            payload: TransactionPayload {
                chain_id: "test-chain".into(),
                authority: "aa".into(),
                instructions: vec![],
                created_at_ms: 0,
                time_to_live_ms: None,
            },
            signature: "00".into(),
        };
        api.submit_transaction(&tx).await.unwrap();

        let posts = transport.posts.lock().unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].0, Endpoint::Transaction);
        assert_eq!(posts[0].1["hash"], "cafe");
    }
}
