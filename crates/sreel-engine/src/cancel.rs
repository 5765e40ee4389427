//! Cooperative cancellation.
//!
//! A single cancel action must abort the whole in-flight pipeline, so every
//! suspension point (submission, status check, inter-poll sleep) answers the
//! same token.

use tokio::sync::watch;

/// Create a linked cancellation pair.
pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelToken { rx: Some(rx) })
}

/// Caller-side handle that fires the cancellation signal.
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }

    /// Mint another token answering this handle.
    pub fn token(&self) -> CancelToken {
        CancelToken {
            rx: Some(self.tx.subscribe()),
        }
    }
}

/// Token polled and awaited at every suspension point.
#[derive(Clone)]
pub struct CancelToken {
    rx: Option<watch::Receiver<bool>>,
}

impl CancelToken {
    /// A token that can never fire.
    pub fn never() -> Self {
        Self { rx: None }
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.rx.as_ref().map(|rx| *rx.borrow()).unwrap_or(false)
    }

    /// Resolves once cancellation is requested.
    ///
    /// Never resolves when the handle was dropped without firing, so
    /// selecting this against a timer cannot spin.
    pub async fn cancelled(&mut self) {
        match &mut self.rx {
            None => std::future::pending().await,
            Some(rx) => loop {
                if *rx.borrow() {
                    return;
                }
                if rx.changed().await.is_err() {
                    // Handle dropped without cancelling
                    std::future::pending::<()>().await;
                }
            },
        }
    }
}
