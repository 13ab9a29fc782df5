//! Committed blocks and the block-stream channel frames.

use serde::{Deserialize, Serialize};

use crate::transaction::{LedgerHash, SignedTransaction};

/// A committed block as delivered by the block stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    /// Height, counted from 1.
    pub height: u64,
    pub hash: LedgerHash,
    pub prev_hash: LedgerHash,
    /// Commit time, milliseconds since the epoch.
    pub timestamp_ms: u64,
    pub transactions: Vec<SignedTransaction>,
}

/// Client→server frames on the block channel.
///
/// `Next` is the only backpressure mechanism: the server sends exactly
/// one block per `Next` and must never push ahead of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockStreamRequest {
    /// First frame after open; positions the server-side stream.
    Subscribe { from_height: u64 },
    /// Pull exactly one block.
    Next,
}

/// Server→client frames on the block channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockStreamMessage {
    /// Handshake acknowledgement; data frames are meaningless before it.
    Accepted,
    /// One committed block, answering one `Next`.
    Block(Block),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_frame_serialization() {
        let frame = BlockStreamRequest::Subscribe { from_height: 5 };
        let json = serde_json::to_string(&frame).unwrap();
        assert_eq!(json, r#"{"type":"subscribe","from_height":5}"#);
    }

    #[test]
    fn next_frame_serialization() {
        let json = serde_json::to_string(&BlockStreamRequest::Next).unwrap();
        assert_eq!(json, r#"{"type":"next"}"#);
    }

    #[test]
    fn block_message_round_trips() {
        let json = r#"{
            "type": "block",
            "height": 2,
            "hash": "ab",
            "prev_hash": "aa",
            "timestamp_ms": 1000,
            "transactions": []
        }"#;
        let msg: BlockStreamMessage = serde_json::from_str(json).unwrap();
        let BlockStreamMessage::Block(block) = msg else {
            panic!("expected block");
        };
        assert_eq!(block.height, 2);
    }
}
