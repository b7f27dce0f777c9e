//! Broadcast bus for supervision events.
//!
//! [`Bus`] is a thin wrapper around [`tokio::sync::broadcast`]. Contexts,
//! task wrappers, and restarting supervisors publish into it; observers
//! subscribe independently. One bus is shared across every attempt of a
//! restarting supervisor, so subscribers see the whole retry history even
//! though each attempt runs under a fresh context.
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never suspends.
//! - **Bounded capacity**: a single ring buffer holds recent events.
//! - **Lag handling**: slow receivers observe `RecvError::Lagged(n)` and
//!   skip the `n` oldest items.
//! - **No persistence**: events published with no live receivers are lost.

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for supervision events.
///
/// Cheap to clone (holds an `Arc`-backed sender). Publishing is
/// fire-and-forget; delivery to observers carries no durability guarantee
/// and never participates in the supervision protocol itself.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a new bus with the given ring-buffer capacity (min 1, clamped).
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<Event>(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to all active receivers.
    ///
    /// Dropped silently when nobody is subscribed.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates a new independent receiver observing subsequent events only.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}
