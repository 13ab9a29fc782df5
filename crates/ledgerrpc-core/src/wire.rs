//! Query wire types for the HTTP `POST /query` endpoint.
//!
//! A query round trip is always a whole [`SignedQueryRequest`]; the
//! server answers with a [`QueryResponse`] that is either *iterable*
//! (a batch plus an optional continuation cursor) or *singular* (one
//! value, no pagination). Every `Continue` request is independently
//! signed — the cursor token alone carries no authority.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Opaque server-issued token identifying a paused server-side result
/// iterator. A consumed cursor is never sent twice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardCursor {
    /// Server-side iterator identity.
    pub query_id: String,
    /// Position within the iterator.
    pub position: u64,
}

/// Pagination parameters attached to a `Start` request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryParams {
    /// Server-side batch size hint. `None` leaves it to the server.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetch_size: Option<u32>,
}

/// An iterable query — returns zero or more items, paginated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "query", rename_all = "snake_case")]
pub enum Query {
    /// Committed blocks, ascending from `from_height`.
    ListBlocks {
        #[serde(skip_serializing_if = "Option::is_none")]
        from_height: Option<u64>,
    },
    /// Committed transactions, optionally scoped to one account.
    ListTransactions {
        #[serde(skip_serializing_if = "Option::is_none")]
        account: Option<String>,
    },
    /// Registered accounts, optionally scoped to one domain.
    ListAccounts {
        #[serde(skip_serializing_if = "Option::is_none")]
        domain: Option<String>,
    },
}

/// A singular query — exactly one value, never paginated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "query", rename_all = "snake_case")]
pub enum SingularQuery {
    /// Height of the latest committed block.
    ChainHeight,
    /// The chain identifier this node serves.
    ChainId,
}

/// The request union sent to `POST /query`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QueryRequest {
    /// One-shot, non-paginated query.
    Singular(SingularQuery),
    /// Open a new server-side iterator.
    Start {
        #[serde(flatten)]
        query: Query,
        #[serde(default)]
        params: QueryParams,
    },
    /// Resume an existing iterator. Independently signed.
    Continue(ForwardCursor),
}

/// A query request plus the authority it acts as, signed as a whole.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedQueryRequest {
    /// Hex-encoded public key of the signing authority.
    pub authority: String,
    /// The request being authorized.
    pub request: QueryRequest,
    /// Hex-encoded signature over the canonical request bytes.
    pub signature: String,
}

impl SignedQueryRequest {
    /// Sign `request` as `signer`'s authority. Called once per round
    /// trip: a `Continue` is signed independently of its `Start`.
    pub fn new(
        signer: &dyn crate::signer::Signer,
        request: QueryRequest,
    ) -> Result<Self, crate::error::SignError> {
        let authority = signer.public_key();
        let bytes = crate::signer::canonical_bytes(&(&authority, &request))?;
        let signature = signer.sign(&bytes);
        Ok(Self {
            authority,
            request,
            signature,
        })
    }

    /// The canonical bytes this request's signature covers.
    pub fn signed_bytes(&self) -> Result<Vec<u8>, crate::error::SignError> {
        crate::signer::canonical_bytes(&(&self.authority, &self.request))
    }
}

/// One page of an iterable result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryOutput {
    /// Decoded items, in server order.
    pub batch: Vec<Value>,
    /// Items remaining on the server after this batch.
    pub remaining_items: u64,
    /// Cursor for the next page, or `None` when the iterator is drained.
    pub continue_cursor: Option<ForwardCursor>,
}

/// The response union returned by `POST /query`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QueryResponse {
    /// A batch of an iterable result.
    Iterable(QueryOutput),
    /// A single value answering a singular query.
    Singular { value: Value },
}

impl QueryResponse {
    /// Variant name, for protocol-violation diagnostics.
    pub fn variant(&self) -> &'static str {
        match self {
            Self::Iterable(_) => "iterable",
            Self::Singular { .. } => "singular",
        }
    }
}
