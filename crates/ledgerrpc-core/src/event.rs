//! Ledger events, subscription filters and the event-channel frames.

use serde::{Deserialize, Serialize};

use crate::transaction::{LedgerHash, TransactionStatus};

/// A transaction moving through the commit pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionEvent {
    pub hash: LedgerHash,
    #[serde(flatten)]
    pub status: TransactionStatus,
    /// Height of the committing block, once known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_height: Option<u64>,
}

/// A block committed to the chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockEvent {
    pub height: u64,
    pub hash: LedgerHash,
}

/// Everything the event stream can deliver.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    Transaction(TransactionEvent),
    Block(BlockEvent),
}

/// Server-side filter sent with the event-channel `Subscribe` frame.
///
/// The server only emits events matching the filter; delivery order is
/// the server's emission order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventFilter {
    /// Deliver transaction pipeline events.
    pub transactions: bool,
    /// Deliver block commit events.
    pub blocks: bool,
    /// Restrict transaction events to one hash; status and height stay
    /// unconstrained.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<LedgerHash>,
}

impl EventFilter {
    /// All transaction pipeline events.
    pub fn transactions() -> Self {
        Self {
            transactions: true,
            ..Self::default()
        }
    }

    /// Pipeline events for a single transaction.
    pub fn transaction(hash: LedgerHash) -> Self {
        Self {
            transactions: true,
            hash: Some(hash),
            ..Self::default()
        }
    }

    /// Block commit events.
    pub fn blocks() -> Self {
        Self {
            blocks: true,
            ..Self::default()
        }
    }
}

/// Client→server frames on the event channel. `Subscribe` is the only
/// one; there is no pull.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventStreamRequest {
    Subscribe { filters: EventFilter },
}

/// Server→client frames on the event channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventStreamMessage {
    /// Handshake acknowledgement.
    Accepted,
    /// One filtered event.
    Event(Event),
}
