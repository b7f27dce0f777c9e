//! Non-blocking fan-out over multiple subscribers.
//!
//! [`SubscriberSet`] distributes each [`Event`] to every subscriber without
//! awaiting their processing:
//!
//! ```text
//!    emit(&Event)
//!        │                        (Arc-clone per subscriber)
//!        ├────────────────► [queue S1] ─► worker S1 ─► on_event()
//!        ├────────────────► [queue S2] ─► worker S2 ─► on_event()
//!        └────────────────► [queue SN] ─► worker SN ─► on_event()
//! ```
//!
//! Guarantees: `emit` returns immediately; per-subscriber FIFO; a panicking
//! subscriber is isolated from the others. Not guaranteed: ordering across
//! subscribers, delivery on queue overflow (the event is dropped for that
//! subscriber, with a warning).

use std::sync::Arc;

use futures::FutureExt;
use tokio::{sync::mpsc, task::JoinHandle};

use super::Subscribe;
use crate::events::Event;

/// Per-subscriber queue with metadata.
struct Lane {
    name: &'static str,
    tx: mpsc::Sender<Arc<Event>>,
}

/// Composite fan-out with per-subscriber bounded queues and worker tasks.
pub struct SubscriberSet {
    lanes: Vec<Lane>,
    workers: Vec<JoinHandle<()>>,
}

impl SubscriberSet {
    /// Creates the set and spawns one worker per subscriber.
    #[must_use]
    pub fn new(subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        let mut lanes = Vec::with_capacity(subscribers.len());
        let mut workers = Vec::with_capacity(subscribers.len());

        for sub in subscribers {
            let name = sub.name();
            let (tx, mut rx) = mpsc::channel::<Arc<Event>>(sub.queue_capacity().max(1));

            let worker = tokio::spawn(async move {
                while let Some(ev) = rx.recv().await {
                    let fut = sub.on_event(ev.as_ref());
                    if std::panic::AssertUnwindSafe(fut).catch_unwind().await.is_err() {
                        log::warn!("subscriber '{}' panicked while handling an event", sub.name());
                    }
                }
            });

            lanes.push(Lane { name, tx });
            workers.push(worker);
        }

        Self { lanes, workers }
    }

    /// Fans one event out to all subscribers (non-blocking).
    ///
    /// If a subscriber's queue is full or its worker is gone, the event is
    /// dropped for that subscriber and a warning is logged.
    pub fn emit(&self, event: &Event) {
        let ev = Arc::new(event.clone());
        for lane in &self.lanes {
            match lane.tx.try_send(Arc::clone(&ev)) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    log::warn!("subscriber '{}' dropped event: queue full", lane.name);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    log::warn!("subscriber '{}' dropped event: worker closed", lane.name);
                }
            }
        }
    }

    /// Graceful shutdown: close all queues and await worker completion.
    pub async fn shutdown(self) {
        drop(self.lanes);
        for worker in self.workers {
            let _ = worker.await;
        }
    }

    /// True if there are no subscribers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lanes.is_empty()
    }

    /// Number of subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lanes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter {
        seen: AtomicUsize,
    }

    #[async_trait]
    impl Subscribe for Counter {
        async fn on_event(&self, _event: &Event) {
            self.seen.fetch_add(1, Ordering::SeqCst);
        }

        fn name(&self) -> &'static str {
            "counter"
        }
    }

    #[tokio::test]
    async fn test_every_subscriber_sees_every_event() {
        let a = Arc::new(Counter {
            seen: AtomicUsize::new(0),
        });
        let b = Arc::new(Counter {
            seen: AtomicUsize::new(0),
        });
        let set = SubscriberSet::new(vec![a.clone(), b.clone()]);
        assert_eq!(set.len(), 2);

        for _ in 0..5 {
            set.emit(&Event::now(EventKind::TaskSpawned));
        }
        set.shutdown().await;

        assert_eq!(a.seen.load(Ordering::SeqCst), 5);
        assert_eq!(b.seen.load(Ordering::SeqCst), 5);
    }

    struct Grumpy;

    #[async_trait]
    impl Subscribe for Grumpy {
        async fn on_event(&self, _event: &Event) {
            panic!("no events today");
        }

        fn name(&self) -> &'static str {
            "grumpy"
        }
    }

    #[tokio::test]
    async fn test_panicking_subscriber_is_isolated() {
        let counter = Arc::new(Counter {
            seen: AtomicUsize::new(0),
        });
        let set = SubscriberSet::new(vec![Arc::new(Grumpy) as Arc<dyn Subscribe>, counter.clone()]);

        set.emit(&Event::now(EventKind::AbortRequested));
        set.emit(&Event::now(EventKind::DrainCompleted));
        set.shutdown().await;

        assert_eq!(counter.seen.load(Ordering::SeqCst), 2);
    }
}
