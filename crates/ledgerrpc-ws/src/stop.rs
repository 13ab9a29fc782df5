//! Cancellation-safe stop trigger shared by the streaming engines.

use tokio::sync::watch;

/// Create a linked stop handle/token pair.
pub fn stop_pair() -> (StopHandle, StopToken) {
    let (tx, rx) = watch::channel(false);
    (StopHandle { tx }, StopToken { rx })
}

/// Clonable trigger. Safe to fire from any task at any time, including
/// while the owning engine is blocked in a wait; firing twice is a
/// no-op.
#[derive(Clone)]
pub struct StopHandle {
    tx: watch::Sender<bool>,
}

impl StopHandle {
    /// Request a stop. Idempotent.
    pub fn stop(&self) {
        let _ = self.tx.send(true);
    }
}

/// The engine-held side of the pair.
pub struct StopToken {
    rx: watch::Receiver<bool>,
}

impl StopToken {
    /// Whether a stop has been requested.
    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once a stop is requested. Cancellation-safe, so it can
    /// sit in a `select!` arm. If every handle is dropped without
    /// firing, this pends forever — dropping a handle is not a stop.
    pub async fn fired(&mut self) {
        if self.rx.wait_for(|stopped| *stopped).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
