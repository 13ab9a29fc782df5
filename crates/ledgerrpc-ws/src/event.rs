//! Event Streaming Engine — push-based, filtered fan-out.
//!
//! One `Subscribe { filters }` at open, then the server paces itself;
//! there is no pull. Every decoded event is published immediately to
//! all attached listeners. An undecodable or out-of-protocol frame
//! fails the whole channel — it is never silently dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use ledgerrpc_core::error::{ProtocolError, StreamError};
use ledgerrpc_core::event::{Event, EventFilter, EventStreamMessage, EventStreamRequest};
use ledgerrpc_core::transport::{ChannelOpener, Endpoint};

use crate::channel::SubscriptionChannel;
use crate::stop::{stop_pair, StopHandle, StopToken};

/// What a listener receives: decoded events until the channel ends, or
/// one protocol error if the channel fails.
pub type EventItem = Result<Event, ProtocolError>;

type Listeners = Arc<Mutex<Vec<mpsc::UnboundedSender<EventItem>>>>;

/// A push-based subscription with multi-listener fan-out.
///
/// The connection is owned by a background reader task; the handle just
/// registers listeners and stops the task.
pub struct EventStream {
    listeners: Listeners,
    stop: StopHandle,
    reader: Mutex<Option<JoinHandle<()>>>,
    closed: Arc<AtomicBool>,
}

impl EventStream {
    /// Open the event channel, send `Subscribe { filters }` and await
    /// acceptance, then start the reader task.
    pub async fn open(
        opener: &dyn ChannelOpener,
        filters: EventFilter,
    ) -> Result<Self, StreamError> {
        let frame = serde_json::to_vec(&EventStreamRequest::Subscribe { filters })
            .map_err(|e| ProtocolError::Undecodable(e.to_string()))?;
        let mut channel = SubscriptionChannel::open(opener, Endpoint::EventStream, frame).await?;
        channel.accepted().await?;
        tracing::debug!("event stream subscribed");

        let (stop, token) = stop_pair();
        let listeners: Listeners = Arc::new(Mutex::new(Vec::new()));
        let closed = Arc::new(AtomicBool::new(false));

        let reader = tokio::spawn(read_loop(
            channel,
            Arc::clone(&listeners),
            token,
            Arc::clone(&closed),
        ));

        Ok(Self {
            listeners,
            stop,
            reader: Mutex::new(Some(reader)),
            closed,
        })
    }

    /// Attach a listener. Events arriving from now on are delivered to
    /// every attached listener; the receiver ends when the channel
    /// closes.
    pub fn listen(&self) -> mpsc::UnboundedReceiver<EventItem> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.listeners.lock().unwrap().push(tx);
        rx
    }

    /// Stop the subscription: close the channel and wait for the reader
    /// task to finish. Safe to call at any time; the second call is a
    /// no-op.
    pub async fn stop(&self) {
        self.stop.stop();
        let reader = self.reader.lock().unwrap().take();
        if let Some(handle) = reader {
            let _ = handle.await;
        }
    }

    /// Whether the underlying channel has fully closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

async fn read_loop(
    mut channel: SubscriptionChannel,
    listeners: Listeners,
    mut token: StopToken,
    closed: Arc<AtomicBool>,
) {
    loop {
        let frame = tokio::select! {
            frame = channel.next_message() => frame,
            _ = token.fired() => {
                let _ = channel.close().await;
                break;
            }
        };

        let Some(bytes) = frame else {
            // Server closed; listeners end when their senders drop.
            tracing::debug!(reason = ?channel.close_reason(), "event channel closed by server");
            break;
        };

        match serde_json::from_slice::<EventStreamMessage>(&bytes) {
            Ok(EventStreamMessage::Event(event)) => dispatch(&listeners, Ok(event)),
            Ok(EventStreamMessage::Accepted) => {
                fail(&mut channel, &listeners, ProtocolError::UnexpectedFrame("accepted")).await;
                break;
            }
            Err(e) => {
                fail(
                    &mut channel,
                    &listeners,
                    ProtocolError::Undecodable(e.to_string()),
                )
                .await;
                break;
            }
        }
    }

    closed.store(true, Ordering::Release);
    listeners.lock().unwrap().clear();
}

/// Publish to every live listener, pruning the dead ones.
fn dispatch(listeners: &Listeners, item: EventItem) {
    listeners
        .lock()
        .unwrap()
        .retain(|tx| tx.send(item.clone()).is_ok());
}

/// A protocol violation fails the whole channel: every listener hears
/// about it, then the connection closes.
async fn fail(channel: &mut SubscriptionChannel, listeners: &Listeners, err: ProtocolError) {
    tracing::warn!(error = %err, "event channel protocol violation");
    dispatch(listeners, Err(err));
    let _ = channel.close().await;
}
