//! Transport seams — the injected HTTP and duplex-channel collaborators.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::TransportError;

/// Service endpoints, with their stable paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// `POST` — signed query requests.
    Query,
    /// `POST` — signed transaction submission.
    Transaction,
    /// `GET` — node configuration.
    Config,
    /// `GET` — node metrics.
    Metrics,
    /// `GET` — data-model schema, raw passthrough.
    Schema,
    /// `GET` — node status summary.
    Status,
    /// Duplex — pull-based block delivery.
    BlockStream,
    /// Duplex — push-based event delivery.
    EventStream,
}

impl Endpoint {
    /// Path relative to the service base URL.
    pub fn path(self) -> &'static str {
        match self {
            Self::Query => "/query",
            Self::Transaction => "/transaction",
            Self::Config => "/config",
            Self::Metrics => "/metrics",
            Self::Schema => "/schema",
            Self::Status => "/status",
            Self::BlockStream => "/block/stream",
            Self::EventStream => "/events",
        }
    }
}

/// One-shot HTTP transport.
///
/// # Thread Safety
/// Implementations must be `Send + Sync`; one transport serves many
/// concurrent independent calls.
///
/// # Object Safety
/// The trait is object-safe and is consumed as `Arc<dyn Transport>`.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// POST a JSON body and return the decoded JSON response body.
    async fn post(&self, endpoint: Endpoint, body: Value) -> Result<Value, TransportError>;

    /// GET an endpoint and return the decoded JSON response body.
    async fn get(&self, endpoint: Endpoint) -> Result<Value, TransportError>;

    /// The transport's base URL (for diagnostics).
    fn url(&self) -> &str;
}

/// Convenience: GET an endpoint and deserialize the body into `T`.
pub async fn get_as<T: DeserializeOwned>(
    transport: &dyn Transport,
    endpoint: Endpoint,
) -> Result<T, TransportError> {
    let value = transport.get(endpoint).await?;
    serde_json::from_value(value).map_err(TransportError::Deserialization)
}

/// An event observed on a raw duplex connection.
#[derive(Debug)]
pub enum ChannelEvent {
    /// One complete inbound message, pre-decode.
    Message(Vec<u8>),
    /// The connection closed; emitted exactly once, terminal.
    Closed {
        /// Close reason reported by the peer, if any.
        reason: Option<String>,
    },
}

/// A message-oriented duplex connection, already established.
///
/// Each subscription owns its own connection; nothing is shared across
/// instances.
#[async_trait]
pub trait DuplexConnection: Send + 'static {
    /// Send one complete message frame.
    async fn send(&mut self, frame: Vec<u8>) -> Result<(), TransportError>;

    /// Await the next inbound event. After [`ChannelEvent::Closed`] has
    /// been returned, keeps returning `Closed`.
    async fn next_event(&mut self) -> ChannelEvent;

    /// Close gracefully. Resolves once the connection is fully closed;
    /// safe to call more than once.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Opens duplex connections to channel endpoints.
#[async_trait]
pub trait ChannelOpener: Send + Sync + 'static {
    /// Establish a new connection to `endpoint`.
    async fn open(&self, endpoint: Endpoint) -> Result<Box<dyn DuplexConnection>, TransportError>;
}
