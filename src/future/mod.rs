//! Single-assignment result slots for asynchronous node operations.
//!
//! The coordination service's API is purely asynchronous: every operation is
//! "issue, then wait for the outcome to arrive". [`outcome_pair`] produces
//! the two halves of that contract. The issuing side hands the
//! [`OutcomeSlot`] to whatever will learn the result (a transport completion
//! path, a watch table); the caller keeps the [`ResultFuture`] and awaits it.
//!
//! `complete` consumes the slot, so a second terminal write is unrepresentable
//! rather than a runtime error.

use tokio::sync::oneshot;
use tracing::trace;

use crate::errors::{ConnectivityError, Result};
use crate::reply::{Outcome, WatchEvent};

/// Completion side of a pending operation. Write-once by construction.
#[derive(Debug)]
pub struct OutcomeSlot<T> {
    tx: oneshot::Sender<Outcome<T>>,
}

impl<T> OutcomeSlot<T> {
    /// Record the terminal outcome and release the waiting reader.
    ///
    /// If the reader has already given up (its future was dropped), the
    /// outcome is discarded silently; there is nobody left to wake.
    pub fn complete(self, outcome: Outcome<T>) {
        if self.tx.send(outcome).is_err() {
            trace!("outcome discarded: no awaiting reader");
        }
    }

    /// Whether the awaiting reader is still interested in the outcome.
    pub fn is_wanted(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// Reader side of a pending operation.
#[derive(Debug)]
pub struct ResultFuture<T> {
    rx: oneshot::Receiver<Outcome<T>>,
}

impl<T> ResultFuture<T> {
    /// Block the calling task until the outcome is known.
    ///
    /// Resolves with [`ConnectivityError::SessionClosed`] if the completing
    /// side was dropped without writing, which happens exactly when the
    /// owning session is torn down.
    pub async fn recv(self) -> Result<Outcome<T>> {
        self.rx
            .await
            .map_err(|_| ConnectivityError::SessionClosed.into())
    }
}

/// Create a connected slot/future pair for one asynchronous operation.
pub fn outcome_pair<T>() -> (OutcomeSlot<T>, ResultFuture<T>) {
    let (tx, rx) = oneshot::channel();
    (OutcomeSlot { tx }, ResultFuture { rx })
}

/// Completion side of a one-shot watch registration.
pub type WatchSlot = OutcomeSlot<WatchEvent>;

/// Pending one-shot watch notification. Consumed by the first matching
/// event; watching further changes requires arming a new registration.
pub type WatchFuture = ResultFuture<WatchEvent>;
