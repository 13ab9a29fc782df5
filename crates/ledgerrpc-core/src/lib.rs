//! ledgerrpc-core — foundation traits and types for LedgerRPC.
//!
//! # Overview
//!
//! LedgerRPC is a client-side protocol layer for a remote ledger
//! service, spoken over HTTP and a duplex message channel. The core
//! crate defines:
//!
//! - [`Transport`] / [`ChannelOpener`] / [`DuplexConnection`] — the
//!   injected transport seams
//! - [`wire`] — signed query requests, cursors and response variants
//! - [`block`] / [`event`] / [`transaction`] — domain types and the
//!   channel frame protocols
//! - [`Signer`] — the signing seam, with a built-in Ed25519 signer
//! - [`error`] — structured error taxonomy

pub mod block;
pub mod error;
pub mod event;
pub mod signer;
pub mod transaction;
pub mod transport;
pub mod wire;

pub use error::{ProtocolError, QueryError, ServiceError, SignError, StreamError, TransportError};
pub use signer::{Ed25519Signer, Signer};
pub use transport::{ChannelEvent, ChannelOpener, DuplexConnection, Endpoint, Transport};
pub use wire::{ForwardCursor, QueryOutput, QueryRequest, QueryResponse, SignedQueryRequest};
