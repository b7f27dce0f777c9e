//! Abort-aware channels: the cooperative cancellation hook.
//!
//! [`channel`] produces an mpsc pair bound to a [`Context`]. Every blocking
//! operation on it honors the context's abort signal:
//!
//! - **before suspending**, the signal is checked; if it already left
//!   `Clear` the operation fails with [`SupError::Abort`] immediately,
//!   *regardless* of whether data or capacity is available;
//! - **while suspended**, the operation races the signal, so an abort wakes
//!   it and fails it without waiting for the peer.
//!
//! Multi-way selects built from these primitives inherit the contract: each
//! branch fails fast on its own, so the select as a whole cannot keep a
//! task blocked under an aborting context.
//!
//! ```text
//! send()/recv():
//!   check_abort()? ──► select! { biased;
//!                                abort ──► Err(Abort)
//!                              , io    ──► Ok / Err(Closed) }
//! ```
//! The select is biased toward the abort arm: if the signal and the mpsc
//! operation are both ready at one resumption point, the abort wins.
//!
//! Cancellation is purely cooperative: a task blocking on anything *outside*
//! these primitives (uninstrumented I/O, a plain `tokio::sync` wait) will
//! not observe the abort. That is a documented limitation, not a bug —
//! sprinkle [`Context::check_abort`] through long uninstrumented sections.

use tokio::sync::mpsc;

use crate::core::Context;
use crate::error::SupError;

/// Creates an abort-aware mpsc channel owned by `cx`.
///
/// `capacity` is clamped to a minimum of 1. Both endpoints carry the
/// context, so every blocking call inherits its abort signal; callers must
/// supply or inherit a context for every blocking operation.
pub fn channel<T>(cx: &Context, capacity: usize) -> (Sender<T>, Receiver<T>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        Sender {
            cx: cx.clone(),
            tx,
        },
        Receiver {
            cx: cx.clone(),
            rx,
        },
    )
}

/// Sending half of an abort-aware channel.
#[derive(Debug)]
pub struct Sender<T> {
    cx: Context,
    tx: mpsc::Sender<T>,
}

impl<T> Clone for Sender<T> {
    fn clone(&self) -> Self {
        Self {
            cx: self.cx.clone(),
            tx: self.tx.clone(),
        }
    }
}

impl<T> Sender<T> {
    /// Sends a value, waiting for capacity.
    ///
    /// Fails with [`SupError::Abort`] once the owning context is aborting —
    /// before suspending and at every resumption point — and with
    /// [`SupError::Closed`] when the receiver is gone. A value the channel
    /// did not accept is dropped before this returns, so anything it owns
    /// releases inside the caller's supervision scope, not on some later
    /// executor tick.
    pub async fn send(&self, value: T) -> Result<(), SupError> {
        self.cx.check_abort()?;
        // Biased: when the abort signal and capacity are ready at the same
        // resumption point, the abort must win. Capacity is reserved first
        // so `value` is never consumed by a discarded send future.
        tokio::select! {
            biased;
            _ = self.cx.aborted() => Err(SupError::Abort),
            permit = self.tx.reserve() => match permit {
                Ok(permit) => {
                    permit.send(value);
                    Ok(())
                }
                Err(_) => Err(SupError::Closed),
            },
        }
    }

    /// Sends without suspending: `Ok(true)` on success, `Ok(false)` when
    /// the channel is full. Still fails fast under an aborting context.
    pub fn try_send(&self, value: T) -> Result<bool, SupError> {
        self.cx.check_abort()?;
        match self.tx.try_send(value) {
            Ok(()) => Ok(true),
            Err(mpsc::error::TrySendError::Full(_)) => Ok(false),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(SupError::Closed),
        }
    }

    /// The context this endpoint is bound to.
    #[inline]
    pub fn context(&self) -> &Context {
        &self.cx
    }
}

/// Receiving half of an abort-aware channel.
#[derive(Debug)]
pub struct Receiver<T> {
    cx: Context,
    rx: mpsc::Receiver<T>,
}

impl<T> Receiver<T> {
    /// Receives the next value.
    ///
    /// `Ok(None)` means every sender is gone and the buffer is empty —
    /// normal end of stream. Fails with [`SupError::Abort`] once the owning
    /// context is aborting, even if a value is already buffered.
    pub async fn recv(&mut self) -> Result<Option<T>, SupError> {
        self.cx.check_abort()?;
        // Biased: when the abort signal and buffered data are ready at the
        // same resumption point, the abort must win.
        tokio::select! {
            biased;
            _ = self.cx.aborted() => Err(SupError::Abort),
            v = self.rx.recv() => Ok(v),
        }
    }

    /// Like [`recv`](Self::recv), but treats end of stream as
    /// [`SupError::Closed`] — for callers that expect a value.
    pub async fn recv_value(&mut self) -> Result<T, SupError> {
        self.recv().await?.ok_or(SupError::Closed)
    }

    /// The context this endpoint is bound to.
    #[inline]
    pub fn context(&self) -> &Context {
        &self.cx
    }
}
