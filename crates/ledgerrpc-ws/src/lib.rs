//! ledgerrpc-ws — duplex channel side of LedgerRPC.
//!
//! # Features
//! - [`WsConnector`] — `tokio-tungstenite`-backed implementation of the
//!   injected channel-opener seam
//! - [`SubscriptionChannel`] — subscribe-on-open channel with a
//!   one-time `accepted()` handshake gate
//! - [`BlockStream`] — pull-based block delivery (one `Next` in flight)
//! - [`EventStream`] — push-based, filtered event fan-out

pub mod block;
pub mod channel;
pub mod connector;
pub mod event;
pub mod stop;

pub use block::BlockStream;
pub use channel::SubscriptionChannel;
pub use connector::{WsConnection, WsConnector};
pub use event::{EventItem, EventStream};
pub use stop::{stop_pair, StopHandle, StopToken};
