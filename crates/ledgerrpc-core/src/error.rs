//! Error taxonomy shared by every LedgerRPC crate.

use thiserror::Error;

/// Errors raised by the underlying HTTP or duplex-channel transport.
///
/// Transport errors are always surfaced to the caller; nothing in this
/// SDK retries automatically.
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP request failed (connection refused, timed out, bad status).
    #[error("HTTP error: {0}")]
    Http(String),

    /// Duplex channel connect/send/receive error.
    #[error("channel error: {0}")]
    Channel(String),

    /// The channel closed while an operation still needed it.
    #[error("channel closed{}", .reason.as_deref().map(|r| format!(": {r}")).unwrap_or_default())]
    Closed {
        /// Close reason reported by the peer, if any.
        reason: Option<String>,
    },

    /// A decoded validation failure reported by the service.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// Response body could not be deserialized.
    #[error("deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),
}

/// Protocol violations — the peer sent something the protocol forbids.
///
/// Fatal to the enclosing operation or channel. Clonable so a single
/// violation can be fanned out to every listener on a failed channel.
#[derive(Debug, Clone, Error)]
pub enum ProtocolError {
    /// The server answered with the wrong query-response variant.
    #[error("unexpected response variant: expected {expected}, got {got}")]
    UnexpectedResponse {
        expected: &'static str,
        got: &'static str,
    },

    /// A channel frame of an unexpected kind arrived.
    #[error("unexpected frame: {0}")]
    UnexpectedFrame(&'static str),

    /// An inbound message could not be decoded at all.
    #[error("undecodable message: {0}")]
    Undecodable(String),

    /// The channel closed or misbehaved before the handshake completed.
    #[error("handshake failed: {0}")]
    HandshakeFailed(String),
}

/// A validation failure reported by the ledger service itself.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
#[error("service error {code}: {message}")]
pub struct ServiceError {
    /// Service-defined error code.
    pub code: i64,
    /// Human-readable message.
    pub message: String,
}

/// Errors from the query cursor engine and singular queries.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The service rejected the query with a decoded validation failure.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// A result-cardinality policy was violated.
    #[error("cardinality error: expected {expected}, got {got} item(s)")]
    Cardinality { expected: &'static str, got: usize },

    /// The request could not be signed.
    #[error(transparent)]
    Sign(#[from] SignError),
}

/// Errors from the block and event streaming engines.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Signing failures.
#[derive(Debug, Error)]
pub enum SignError {
    /// Key material was malformed (wrong length, invalid point).
    #[error("invalid key material: {0}")]
    InvalidKey(String),

    /// The payload could not be canonicalized for signing.
    #[error("payload canonicalization failed: {0}")]
    Canonicalize(#[from] serde_json::Error),
}

impl QueryError {
    /// Returns `true` if the failure came from the service's validator
    /// rather than the transport or the protocol layer.
    pub fn is_service_error(&self) -> bool {
        matches!(self, Self::Service(_))
    }

    /// Lift a transport failure, unwrapping a service-reported
    /// validation failure into its own variant.
    pub fn from_transport(err: TransportError) -> Self {
        match err {
            TransportError::Service(service) => Self::Service(service),
            other => Self::Transport(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_error_formats_reason() {
        let with = TransportError::Closed {
            reason: Some("going away".into()),
        };
        assert_eq!(with.to_string(), "channel closed: going away");

        let without = TransportError::Closed { reason: None };
        assert_eq!(without.to_string(), "channel closed");
    }

    #[test]
    fn service_error_round_trips() {
        let err = ServiceError {
            code: 4001,
            message: "unknown account".into(),
        };
        let json = serde_json::to_string(&err).unwrap();
        let back: ServiceError = serde_json::from_str(&json).unwrap();
        assert_eq!(back.code, 4001);
        assert!(QueryError::from(back).is_service_error());
    }
}
