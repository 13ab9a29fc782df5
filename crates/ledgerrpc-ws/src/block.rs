//! Block Streaming Engine — pull-based, one `Next` in flight.
//!
//! The server must never push ahead of a `Next`, and the engine never
//! sends a second `Next` before consuming the previous block. A close
//! from either side ends the sequence cleanly; only a malformed or
//! out-of-protocol frame is an error.

use async_stream::try_stream;
use futures::Stream;

use ledgerrpc_core::block::{Block, BlockStreamMessage, BlockStreamRequest};
use ledgerrpc_core::error::{ProtocolError, StreamError};
use ledgerrpc_core::transport::{ChannelOpener, Endpoint};

use crate::channel::SubscriptionChannel;
use crate::stop::{stop_pair, StopHandle, StopToken};

/// Engine states. `AwaitingBlock` exists only inside a `next_block`
/// call; between calls the engine is `Ready` or `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Ready,
    Closed,
}

enum Pull {
    Frame(Option<Vec<u8>>),
    Stopped,
}

/// A pull-based stream of committed blocks.
pub struct BlockStream {
    channel: SubscriptionChannel,
    state: State,
    stop: StopHandle,
    token: StopToken,
}

impl BlockStream {
    /// Open the block channel, send `Subscribe { from_height }` and
    /// await the server's acceptance.
    pub async fn subscribe(
        opener: &dyn ChannelOpener,
        from_height: u64,
    ) -> Result<Self, StreamError> {
        let frame = encode(&BlockStreamRequest::Subscribe { from_height })?;
        let mut channel = SubscriptionChannel::open(opener, Endpoint::BlockStream, frame).await?;
        channel.accepted().await?;
        tracing::debug!(from_height, "block stream subscribed");

        let (stop, token) = stop_pair();
        Ok(Self {
            channel,
            state: State::Ready,
            stop,
            token,
        })
    }

    /// Pull exactly one block.
    ///
    /// Sends one `Next`, then races the reply against channel close and
    /// the stop trigger. `Ok(None)` means the sequence ended cleanly —
    /// server close and local stop both land here, never in `Err`.
    pub async fn next_block(&mut self) -> Result<Option<Block>, StreamError> {
        if self.state == State::Closed {
            return Ok(None);
        }
        if self.token.is_stopped() || self.channel.is_closed() {
            return self.shut_down().await;
        }

        // Ready → AwaitingBlock. The one outstanding pull.
        self.channel
            .send(encode(&BlockStreamRequest::Next)?)
            .await
            .map_err(StreamError::Transport)?;

        let pull = tokio::select! {
            frame = self.channel.next_message() => Pull::Frame(frame),
            _ = self.token.fired() => Pull::Stopped,
        };

        match pull {
            Pull::Stopped => self.shut_down().await,
            Pull::Frame(None) => {
                // Server closed mid-wait: clean end of sequence.
                self.state = State::Closed;
                Ok(None)
            }
            Pull::Frame(Some(bytes)) => match decode(&bytes) {
                Ok(BlockStreamMessage::Block(block)) => {
                    tracing::trace!(height = block.height, "block received");
                    Ok(Some(block))
                }
                Ok(BlockStreamMessage::Accepted) => {
                    self.fail().await;
                    Err(ProtocolError::UnexpectedFrame("accepted").into())
                }
                Err(err) => {
                    self.fail().await;
                    Err(err)
                }
            },
        }
    }

    /// Clonable handle that stops the stream from another task.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Stop the stream. Safe at any time, including while a pull is
    /// waiting — the pending `next_block` resolves with `Ok(None)` via
    /// the close path. Idempotent.
    pub fn stop(&self) {
        self.stop.stop();
    }

    /// Whether the engine has reached its terminal state.
    pub fn is_closed(&self) -> bool {
        self.state == State::Closed
    }

    /// Adapt into a `futures::Stream` of blocks.
    pub fn into_stream(mut self) -> impl Stream<Item = Result<Block, StreamError>> + Send {
        try_stream! {
            while let Some(block) = self.next_block().await? {
                yield block;
            }
        }
    }

    async fn shut_down(&mut self) -> Result<Option<Block>, StreamError> {
        self.state = State::Closed;
        self.channel
            .close()
            .await
            .map_err(StreamError::Transport)?;
        Ok(None)
    }

    async fn fail(&mut self) {
        self.state = State::Closed;
        let _ = self.channel.close().await;
    }
}

fn encode(frame: &BlockStreamRequest) -> Result<Vec<u8>, StreamError> {
    serde_json::to_vec(frame).map_err(|e| ProtocolError::Undecodable(e.to_string()).into())
}

fn decode(bytes: &[u8]) -> Result<BlockStreamMessage, StreamError> {
    serde_json::from_slice(bytes).map_err(|e| ProtocolError::Undecodable(e.to_string()).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;

    use crate::channel::testing::{accepted_frame, FakeOpener, Reply, Script};

    fn block_frame(height: u64) -> Vec<u8> {
        json!({
            "type": "block",
            "height": height,
            "hash": format!("{height:02x}"),
            "prev_hash": format!("{:02x}", height - 1),
            "timestamp_ms": height * 1000,
            "transactions": [],
        })
        .to_string()
        .into_bytes()
    }

    async fn subscribed(script: Arc<Script>) -> BlockStream {
        let opener = FakeOpener { script };
        BlockStream::subscribe(&opener, 2).await.unwrap()
    }

    #[tokio::test]
    async fn pulls_blocks_in_order_then_ends_cleanly_on_close() {
        let script = Script::new(vec![
            Reply::Frames(vec![accepted_frame()]), // Subscribe
            Reply::Frames(vec![block_frame(2)]),   // Next #1
            Reply::Frames(vec![block_frame(3)]),   // Next #2
            Reply::Frames(vec![block_frame(4)]),   // Next #3
            Reply::Close(None),                    // Next #4 → server closes
        ]);
        let mut stream = subscribed(Arc::clone(&script)).await;

        for expected in [2u64, 3, 4] {
            let block = stream.next_block().await.unwrap().unwrap();
            assert_eq!(block.height, expected);
        }

        // Fourth pull: the server closes instead of answering. Clean end.
        assert!(stream.next_block().await.unwrap().is_none());
        assert!(stream.is_closed());

        // One Subscribe + four Next frames; never two Nexts for one block.
        let sent = script.sent_frames();
        assert_eq!(sent.len(), 5);
        assert_eq!(sent[0], br#"{"type":"subscribe","from_height":2}"#.to_vec());
        for next in &sent[1..] {
            assert_eq!(next, &br#"{"type":"next"}"#.to_vec());
        }
    }

    #[tokio::test]
    async fn stop_resolves_a_pending_pull_via_the_close_path() {
        let script = Script::new(vec![
            Reply::Frames(vec![accepted_frame()]),
            Reply::Silence, // Next never answered
        ]);
        let mut stream = subscribed(script).await;
        let handle = stream.stop_handle();

        let stopper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            handle.stop();
        });

        // No hang, no error: the pending pull ends the sequence.
        let ended = tokio::time::timeout(Duration::from_secs(1), stream.next_block())
            .await
            .expect("pull must not hang after stop");
        assert!(ended.unwrap().is_none());
        assert!(stream.is_closed());
        stopper.await.unwrap();
    }

    #[tokio::test]
    async fn stop_twice_is_a_no_op() {
        let script = Script::new(vec![Reply::Frames(vec![accepted_frame()])]);
        let mut stream = subscribed(Arc::clone(&script)).await;

        stream.stop();
        stream.stop();
        assert!(stream.next_block().await.unwrap().is_none());
        assert!(stream.next_block().await.unwrap().is_none());

        // Only the Subscribe frame ever went out — no Next after stop,
        // no duplicate close traffic.
        assert_eq!(script.sent_frames().len(), 1);
    }

    #[tokio::test]
    async fn non_block_frame_is_a_protocol_violation() {
        let script = Script::new(vec![
            Reply::Frames(vec![accepted_frame()]),
            Reply::Frames(vec![br#"{"type":"event","payload":1}"#.to_vec()]),
        ]);
        let mut stream = subscribed(script).await;

        let err = stream.next_block().await.unwrap_err();
        assert!(matches!(err, StreamError::Protocol(_)));
        assert!(stream.is_closed());
    }

    #[tokio::test]
    async fn stream_adapter_yields_until_close() {
        use tokio_stream::StreamExt;

        let script = Script::new(vec![
            Reply::Frames(vec![accepted_frame()]),
            Reply::Frames(vec![block_frame(2)]),
            Reply::Close(None),
        ]);
        let stream = subscribed(script).await.into_stream();
        tokio::pin!(stream);

        let heights: Vec<u64> = {
            let mut out = Vec::new();
            while let Some(item) = stream.next().await {
                out.push(item.unwrap().height);
            }
            out
        };
        assert_eq!(heights, vec![2]);
    }
}
