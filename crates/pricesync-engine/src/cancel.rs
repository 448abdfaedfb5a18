//! Cooperative cancellation for sync runs.
//!
//! The orchestrator checks the signal before every batch and before every
//! inter-batch wait. Work already persisted stays persisted.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

/// Triggers cancellation for every [`CancelSignal`] cloned from its pair.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
    deadline: Option<Instant>,
}

#[must_use]
pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (
        CancelHandle { tx },
        CancelSignal { rx, deadline: None },
    )
}

impl CancelSignal {
    /// A signal that only fires if a deadline is later attached.
    #[must_use]
    pub fn never() -> Self {
        let (_, signal) = cancel_pair();
        signal
    }

    /// Also cancels once `timeout` has elapsed from now. A timeout too far
    /// out to represent sets no deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Instant::now().checked_add(timeout);
        self
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Resolves once cancellation is requested or the deadline passes.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        let requested = async move {
            loop {
                if *rx.borrow_and_update() {
                    return;
                }
                if rx.changed().await.is_err() {
                    // Handle dropped without cancelling.
                    std::future::pending::<()>().await;
                }
            }
        };

        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    () = requested => {}
                    () = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => requested.await,
        }
    }
}
