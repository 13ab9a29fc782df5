//! ledgerrpc-http — HTTP side of LedgerRPC.
//!
//! # Features
//! - `reqwest`-backed [`HttpTransport`] implementing the injected
//!   transport seam
//! - [`QueryClient`] / [`QueryCursor`] — the cursor-driven pagination
//!   engine with result-cardinality policies
//! - [`LedgerApi`] — one-shot endpoints (status, config, metrics,
//!   schema, transaction submission)

pub mod api;
pub mod client;
pub mod query;

pub use api::{LedgerApi, NodeConfig, NodeMetrics, NodeStatus};
pub use client::{HttpTransport, HttpTransportConfig};
pub use query::{QueryClient, QueryCursor};
