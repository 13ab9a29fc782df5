//! Transaction submission and confirmation.
//!
//! The ordering is load-bearing: the event subscription's accept signal
//! must resolve before the transaction is posted, so a confirmation
//! that lands immediately after submission cannot be missed. After the
//! post, five outcomes race and the first one wins; the event
//! subscription is torn down on every exit path.

use thiserror::Error;
use tokio::sync::mpsc;

use ledgerrpc_core::error::{ProtocolError, SignError, StreamError, TransportError};
use ledgerrpc_core::event::{Event, EventFilter};
use ledgerrpc_core::transaction::{SignedTransaction, TransactionStatus};
use ledgerrpc_ws::{EventItem, StopToken};

use crate::client::LedgerClient;

/// Terminal failures of [`LedgerClient::submit`].
///
/// `Rejected` and `Expired` are expected first-class outcomes, not
/// bugs; they travel the error channel so a caller can distinguish
/// them from connectivity loss and local cancellation.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// The HTTP submission itself failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The event subscription could not be established.
    #[error(transparent)]
    Stream(#[from] StreamError),

    /// The event channel violated its protocol mid-confirmation.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Signing failed while building the transaction.
    #[error(transparent)]
    Sign(#[from] SignError),

    /// The validator rejected the transaction.
    #[error("transaction rejected: {reason}")]
    Rejected { reason: String },

    /// The transaction's time-to-live elapsed before commitment.
    #[error("transaction expired before commitment")]
    Expired,

    /// The event channel closed before a terminal status arrived.
    #[error("connection lost while awaiting confirmation")]
    ConnectionLost,

    /// The caller's abort signal fired first.
    #[error("submission aborted by caller")]
    Aborted,
}

/// Options for [`LedgerClient::submit`].
#[derive(Default)]
pub struct SubmitOptions {
    /// When `false`, fire and forget: one HTTP round trip, no
    /// confirmation.
    pub fire_and_forget: bool,
    /// Optional abort trigger; firing it resolves the submission with
    /// [`SubmitError::Aborted`]. Obtain a pair via
    /// [`ledgerrpc_ws::stop_pair`].
    pub abort: Option<StopToken>,
}

impl LedgerClient {
    /// Submit a signed transaction.
    ///
    /// With confirmation (the default), resolves once the transaction
    /// reaches a terminal pipeline status: `Ok(block_height)` on
    /// approval, a structured [`SubmitError`] otherwise. Fire and
    /// forget resolves as soon as the service accepts the transaction
    /// for processing and always yields `Ok(None)`.
    pub async fn submit(
        &self,
        tx: &SignedTransaction,
        options: SubmitOptions,
    ) -> Result<Option<u64>, SubmitError> {
        if options.fire_and_forget {
            self.api().submit_transaction(tx).await?;
            return Ok(None);
        }

        // Listener first: the subscription must be accepted before the
        // transaction exists server-side.
        let events = self
            .events(EventFilter::transaction(tx.hash.clone()))
            .await?;
        let listener = events.listen();

        let outcome = confirm(self, tx, listener, options.abort).await;

        // Scoped teardown: every exit path stops the subscription.
        events.stop().await;
        outcome
    }
}

/// Post the transaction, then race the five ways out.
async fn confirm(
    client: &LedgerClient,
    tx: &SignedTransaction,
    mut listener: mpsc::UnboundedReceiver<EventItem>,
    mut abort: Option<StopToken>,
) -> Result<Option<u64>, SubmitError> {
    client.api().submit_transaction(tx).await?;
    tracing::debug!(hash = %tx.hash, "transaction posted, awaiting confirmation");

    loop {
        let item = tokio::select! {
            _ = abort_fired(&mut abort) => return Err(SubmitError::Aborted),
            item = listener.recv() => item,
        };

        let event = match item {
            None => return Err(SubmitError::ConnectionLost),
            Some(Err(protocol)) => return Err(protocol.into()),
            Some(Ok(event)) => event,
        };

        let Event::Transaction(tx_event) = event else {
            continue;
        };
        if tx_event.hash != tx.hash {
            continue;
        }

        match tx_event.status {
            TransactionStatus::Queued => continue,
            TransactionStatus::Approved => return Ok(tx_event.block_height),
            TransactionStatus::Rejected { reason } => {
                return Err(SubmitError::Rejected { reason })
            }
            TransactionStatus::Expired => return Err(SubmitError::Expired),
        }
    }
}

async fn abort_fired(abort: &mut Option<StopToken>) {
    match abort {
        Some(token) => token.fired().await,
        None => std::future::pending().await,
    }
}
