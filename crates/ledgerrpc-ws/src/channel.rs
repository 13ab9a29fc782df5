//! Subscription channel — the shared abstraction under both streaming
//! engines.
//!
//! Wraps a raw [`DuplexConnection`]: the protocol-specific `Subscribe`
//! frame goes out at open, then [`SubscriptionChannel::accepted`] gates
//! on the server's one-time acknowledgement. After that the channel
//! hands out raw frames pre-decode; each engine owns its own decoding.

use serde::Deserialize;

use ledgerrpc_core::error::{ProtocolError, StreamError, TransportError};
use ledgerrpc_core::transport::{ChannelEvent, ChannelOpener, DuplexConnection, Endpoint};

/// Minimal view of a server frame, enough to recognize the handshake.
#[derive(Deserialize)]
struct FrameTag<'a> {
    #[serde(rename = "type", borrow)]
    kind: &'a str,
}

/// A duplex subscription channel with a one-time handshake gate.
///
/// Each channel owns its connection exclusively; instances share no
/// state.
pub struct SubscriptionChannel {
    conn: Box<dyn DuplexConnection>,
    accepted: bool,
    closed: bool,
    close_reason: Option<String>,
}

impl SubscriptionChannel {
    /// Open a connection to `endpoint` and send the one-time
    /// `subscribe_frame`. The handshake is not yet complete — call
    /// [`accepted`](Self::accepted) before reading data frames.
    pub async fn open(
        opener: &dyn ChannelOpener,
        endpoint: Endpoint,
        subscribe_frame: Vec<u8>,
    ) -> Result<Self, StreamError> {
        let mut conn = opener.open(endpoint).await.map_err(StreamError::Transport)?;
        conn.send(subscribe_frame)
            .await
            .map_err(StreamError::Transport)?;
        Ok(Self {
            conn,
            accepted: false,
            closed: false,
            close_reason: None,
        })
    }

    /// Await the server's `Accepted` frame.
    ///
    /// A close before acceptance, or any other first frame, is a hard
    /// handshake failure — never auto-retried here.
    pub async fn accepted(&mut self) -> Result<(), StreamError> {
        if self.accepted {
            return Ok(());
        }
        match self.conn.next_event().await {
            ChannelEvent::Message(bytes) => {
                let tag: FrameTag = match serde_json::from_slice(&bytes) {
                    Ok(tag) => tag,
                    Err(e) => {
                        self.close().await?;
                        return Err(ProtocolError::HandshakeFailed(format!(
                            "undecodable first frame: {e}"
                        ))
                        .into());
                    }
                };
                if tag.kind != "accepted" {
                    self.close().await?;
                    return Err(ProtocolError::HandshakeFailed(format!(
                        "expected accepted frame, got {:?}",
                        tag.kind
                    ))
                    .into());
                }
                self.accepted = true;
                tracing::debug!("subscription accepted");
                Ok(())
            }
            ChannelEvent::Closed { reason } => {
                self.mark_closed(reason.clone());
                Err(ProtocolError::HandshakeFailed(
                    reason.unwrap_or_else(|| "connection closed before acceptance".into()),
                )
                .into())
            }
        }
    }

    /// Send one frame.
    pub async fn send(&mut self, frame: Vec<u8>) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed {
                reason: self.close_reason.clone(),
            });
        }
        self.conn.send(frame).await
    }

    /// Await the next raw message. Returns `None` exactly once the
    /// channel has closed, and keeps returning `None` thereafter.
    pub async fn next_message(&mut self) -> Option<Vec<u8>> {
        if self.closed {
            return None;
        }
        match self.conn.next_event().await {
            ChannelEvent::Message(bytes) => Some(bytes),
            ChannelEvent::Closed { reason } => {
                self.mark_closed(reason);
                None
            }
        }
    }

    /// Whether the channel has fully closed.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Close reason reported by the peer, if it closed first.
    pub fn close_reason(&self) -> Option<&str> {
        self.close_reason.as_deref()
    }

    /// Close gracefully. Idempotent — a second call sends nothing.
    /// Resolves once the connection is fully closed.
    pub async fn close(&mut self) -> Result<(), TransportError> {
        if self.closed {
            return Ok(());
        }
        self.conn.close().await?;
        self.mark_closed(None);
        Ok(())
    }

    fn mark_closed(&mut self, reason: Option<String>) {
        self.closed = true;
        if self.close_reason.is_none() {
            self.close_reason = reason;
        }
    }
}

#[doc(hidden)]
pub mod testing {
    //! Scripted fake connection shared by the engine tests here and in
    //! the composition crate.

    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use tokio::sync::mpsc;

    use ledgerrpc_core::error::TransportError;
    use ledgerrpc_core::transport::{ChannelEvent, ChannelOpener, DuplexConnection, Endpoint};

    /// What the fake server does in response to one inbound frame.
    #[derive(Clone)]
    pub enum Reply {
        /// Emit these frames.
        Frames(Vec<Vec<u8>>),
        /// Close the connection.
        Close(Option<String>),
        /// Emit nothing; the client will keep waiting.
        Silence,
    }

    /// Scripted fake server: a queue of replies consumed one per
    /// received frame, a log of everything the client sent, and an
    /// out-of-band emit path for push-style protocols.
    pub struct Script {
        pub replies: Mutex<VecDeque<Reply>>,
        pub sent: Mutex<Vec<Vec<u8>>>,
        connections: Mutex<Vec<mpsc::UnboundedSender<ChannelEvent>>>,
        closed_connections: Mutex<usize>,
    }

    impl Script {
        pub fn new(replies: Vec<Reply>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                sent: Mutex::new(Vec::new()),
                connections: Mutex::new(Vec::new()),
                closed_connections: Mutex::new(0),
            })
        }

        pub fn sent_frames(&self) -> Vec<Vec<u8>> {
            self.sent.lock().unwrap().clone()
        }

        /// How many connections were closed from the client side.
        pub fn closed_connections(&self) -> usize {
            *self.closed_connections.lock().unwrap()
        }

        /// Push one frame to the most recent connection, unprompted.
        pub fn emit_frame(&self, frame: Vec<u8>) {
            self.emit(ChannelEvent::Message(frame));
        }

        /// Close the most recent connection from the server side.
        pub fn emit_close(&self, reason: Option<String>) {
            self.emit(ChannelEvent::Closed { reason });
        }

        fn emit(&self, event: ChannelEvent) {
            let connections = self.connections.lock().unwrap();
            let tx = connections.last().expect("no connection opened yet");
            let _ = tx.send(event);
        }
    }

    pub struct FakeConnection {
        script: Arc<Script>,
        inbound_tx: mpsc::UnboundedSender<ChannelEvent>,
        inbound_rx: mpsc::UnboundedReceiver<ChannelEvent>,
        closed: bool,
    }

    impl FakeConnection {
        pub fn new(script: Arc<Script>) -> Self {
            let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
            script.connections.lock().unwrap().push(inbound_tx.clone());
            Self {
                script,
                inbound_tx,
                inbound_rx,
                closed: false,
            }
        }
    }

    #[async_trait]
    impl DuplexConnection for FakeConnection {
        async fn send(&mut self, frame: Vec<u8>) -> Result<(), TransportError> {
            if self.closed {
                return Err(TransportError::Closed { reason: None });
            }
            self.script.sent.lock().unwrap().push(frame);
            let reply = self
                .script
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Reply::Silence);
            match reply {
                Reply::Frames(frames) => {
                    for f in frames {
                        let _ = self.inbound_tx.send(ChannelEvent::Message(f));
                    }
                }
                Reply::Close(reason) => {
                    let _ = self.inbound_tx.send(ChannelEvent::Closed { reason });
                }
                Reply::Silence => {}
            }
            Ok(())
        }

        async fn next_event(&mut self) -> ChannelEvent {
            if self.closed {
                return ChannelEvent::Closed { reason: None };
            }
            match self.inbound_rx.recv().await {
                Some(event) => event,
                // Sender half never drops while self is alive; treat a
                // drained-and-dropped queue as a close anyway.
                None => ChannelEvent::Closed { reason: None },
            }
        }

        async fn close(&mut self) -> Result<(), TransportError> {
            if !self.closed {
                self.closed = true;
                *self.script.closed_connections.lock().unwrap() += 1;
            }
            Ok(())
        }
    }

    /// Opener handing out one fake connection per call, all driven by
    /// the same script.
    pub struct FakeOpener {
        pub script: Arc<Script>,
    }

    #[async_trait]
    impl ChannelOpener for FakeOpener {
        async fn open(
            &self,
            _endpoint: Endpoint,
        ) -> Result<Box<dyn DuplexConnection>, TransportError> {
            Ok(Box::new(FakeConnection::new(Arc::clone(&self.script))))
        }
    }

    pub fn accepted_frame() -> Vec<u8> {
        br#"{"type":"accepted"}"#.to_vec()
    }
}
