//! Transaction payloads, hashes and pipeline statuses.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 digest identifying a transaction or block.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LedgerHash(pub String);

impl LedgerHash {
    /// Hash arbitrary canonical bytes.
    pub fn of_bytes(bytes: &[u8]) -> Self {
        let digest = Sha256::digest(bytes);
        Self(hex::encode(digest))
    }
}

impl std::fmt::Display for LedgerHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for LedgerHash {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// The caller-supplied part of a transaction, before signing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionPayload {
    /// Chain the transaction is addressed to.
    pub chain_id: String,
    /// Authority (hex public key) issuing the instructions.
    pub authority: String,
    /// Opaque instruction list, encoded by the caller's codec.
    pub instructions: Vec<Value>,
    /// Client-side creation time, milliseconds since the epoch.
    pub created_at_ms: u64,
    /// Server-side expiry window, milliseconds from creation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_to_live_ms: Option<u64>,
}

/// A payload plus its hash and signature, ready for `POST /transaction`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedTransaction {
    /// SHA-256 of the canonical payload bytes.
    pub hash: LedgerHash,
    pub payload: TransactionPayload,
    /// Hex-encoded signature over the canonical payload bytes.
    pub signature: String,
}

/// Pipeline status of a submitted transaction.
///
/// `Queued` is the only non-terminal status; the confirmation engine
/// keeps waiting through it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Accepted into the queue, not yet validated.
    Queued,
    /// Committed in a block.
    Approved,
    /// Validation failed; the transaction will never commit.
    Rejected { reason: String },
    /// Time-to-live elapsed before commitment.
    Expired,
}

impl TransactionStatus {
    /// Whether no further status change can occur.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Queued)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_stable_hex() {
        let a = LedgerHash::of_bytes(b"ledger");
        let b = LedgerHash::of_bytes(b"ledger");
        assert_eq!(a, b);
        assert_eq!(a.0.len(), 64);
        assert!(a.0.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn status_terminality() {
        assert!(!TransactionStatus::Queued.is_terminal());
        assert!(TransactionStatus::Approved.is_terminal());
        assert!(TransactionStatus::Rejected {
            reason: "bad".into()
        }
        .is_terminal());
        assert!(TransactionStatus::Expired.is_terminal());
    }

    #[test]
    fn rejected_status_serialization() {
        let status = TransactionStatus::Rejected {
            reason: "insufficient balance".into(),
        };
        let json = serde_json::to_string(&status).unwrap();
        assert!(json.contains("\"status\":\"rejected\""));
        assert!(json.contains("insufficient balance"));
    }
}
