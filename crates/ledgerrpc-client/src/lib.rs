//! ledgerrpc-client — the high-level LedgerRPC client.
//!
//! Composes the HTTP query/API layer and the duplex streaming engines
//! behind one [`LedgerClient`]:
//!
//! - [`LedgerClient::queries`] — signed, cursor-paginated queries
//! - [`LedgerClient::blocks`] — pull-based block streaming
//! - [`LedgerClient::events`] — push-based, filtered event fan-out
//! - [`LedgerClient::submit`] — submit a transaction and await its
//!   terminal pipeline status
//!
//! ```no_run
//! use std::sync::Arc;
//! use ledgerrpc_client::{LedgerClient, LedgerClientConfig, SubmitOptions};
//! use ledgerrpc_core::signer::Ed25519Signer;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let signer = Arc::new(Ed25519Signer::from_seed([7u8; 32]));
//! let client = LedgerClient::new(
//!     LedgerClientConfig {
//!         http_url: "http://localhost:8080".into(),
//!         ws_url: "ws://localhost:8081".into(),
//!         chain_id: "mainnet".into(),
//!         http: Default::default(),
//!     },
//!     signer,
//! );
//!
//! let tx = client.build_transaction(vec![serde_json::json!({"mint": 1})], None)?;
//! let height = client.submit(&tx, SubmitOptions::default()).await?;
//! println!("committed at {height:?}");
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod confirm;

pub use client::{LedgerClient, LedgerClientConfig};
pub use confirm::{SubmitError, SubmitOptions};

// The abort seam of `SubmitOptions` is the same stop pair the streaming
// engines use.
pub use ledgerrpc_ws::{stop_pair, StopHandle, StopToken};
