//! # chanvisor
//!
//! **Chanvisor** is a supervision library for trees of channel-communicating
//! async tasks.
//!
//! It provides a supervision [`Context`] that tracks every spawned task,
//! carries a pending-error queue, and broadcasts a single abort signal;
//! abort-aware [`channel`]s that fail fast under that signal; and a
//! bounded-retry [`Restarter`] that tears the whole tree down and rebuilds
//! it from scratch when an error goes unhandled for too long.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!                ┌──────────────────────────────────────────────┐
//!                │  Restarter (bounded-retry supervisor)        │
//!                │  - one fresh Context per attempt             │
//!                │  - stale watcher over the pending queue      │
//!                │  - Bus shared across all attempts            │
//!                └───────────────┬──────────────────────────────┘
//!                                ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Context (one supervision scope)                            │
//! │  - children: ids of every live spawned task                 │
//! │  - errors:   FIFO queue of unconsumed error records         │
//! │  - abort:    Clear ─► Aborting ─► Aborted                   │
//! └──────┬──────────────────┬──────────────────┬────────────────┘
//!        ▼                  ▼                  ▼
//!  ┌───────────┐      ┌───────────┐      ┌───────────┐
//!  │ TaskHandle│      │ TaskHandle│      │ TaskHandle│
//!  │ (Deferred)│      │(Immediate)│      │(Immediate)│
//!  └─────┬─────┘      └─────┬─────┘      └─────┬─────┘
//!        │ join() ─► result │ errors ─► pending queue
//!        │                  │
//!        └───── tasks talk over abort-aware channels ─────┐
//!                                                         ▼
//!                    channel(&cx, cap) ─► (Sender, Receiver)
//!                    every send/recv races cx.aborted()
//! ```
//!
//! ### Lifecycle of one supervised attempt
//! ```text
//! Restarter::run(start)
//!
//! loop {
//!   ├─► cx = fresh Context (shared Bus)
//!   ├─► publish AttemptStarting{ attempt }
//!   ├─► race start(cx) against the stale watcher:
//!   │       │
//!   │       ├─ start returns Ok(v) ─► wait for pending queue to settle
//!   │       │       ├─ settled  ─► abort+drain leftovers ─► return Ok(v)
//!   │       │       └─ stale    ─► trigger restart
//!   │       │
//!   │       ├─ start returns Err ─► trigger restart
//!   │       │
//!   │       └─ a record outlives stale_timeout
//!   │               ─► begin_abort, let start unwind ─► trigger restart
//!   │
//!   ├─► begin_abort ─► channels fail fast ─► tasks unwind
//!   ├─► await_drain (every child deregistered)
//!   ├─► failed_attempts += 1
//!   │       ├─ > retries ─► return Err(RetriesExhausted)
//!   │       └─ else ─► publish RetryScheduled, backoff sleep, continue
//! }
//! ```
//!
//! ## Features
//! | Area              | Description                                                       | Key types / traits                    |
//! |-------------------|-------------------------------------------------------------------|---------------------------------------|
//! | **Context**       | Track children, queue errors, broadcast one abort signal.         | [`Context`], [`AbortState`]           |
//! | **Tasks**         | Spawn wrapped bodies with deferred or immediate error routing.    | [`TaskHandle`], [`ErrorMode`]         |
//! | **Channels**      | Abort-aware mpsc endpoints bound to a context.                    | [`channel`], [`Sender`], [`Receiver`] |
//! | **Supervision**   | Bounded-retry restart with stale-error detection.                 | [`Restarter`], [`supervise`]          |
//! | **Combinators**   | Ordered fan-in helpers over handles and receivers.                | [`gather_in_order`], [`parallel_map`] |
//! | **Policies**      | Delay schedule between restart attempts.                          | [`RestartBackoff`]                    |
//! | **Subscriber API**| Observe the supervision event stream (logging, metrics).          | [`Subscribe`], [`SubscriberSet`]      |
//! | **Errors**        | One typed error for everything crossing a supervision boundary.   | [`SupError`]                          |
//! | **Configuration** | Retry budget, stale timeout, backoff, bus capacity.               | [`SupervisorConfig`]                  |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use chanvisor::{channel, supervise, Context, ErrorMode, SupervisorConfig};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let result = supervise(SupervisorConfig::default(), |cx: Context| async move {
//!         let (tx, mut rx) = channel(&cx, 8);
//!
//!         cx.spawn::<(), _>("producer", ErrorMode::Deferred, async move {
//!             for i in 0..4u32 {
//!                 tx.send(i).await?;
//!             }
//!             Ok(())
//!         });
//!
//!         let mut sum = 0;
//!         while let Some(n) = rx.recv().await? {
//!             sum += n;
//!         }
//!         Ok(sum)
//!     })
//!     .await?;
//!
//!     assert_eq!(result, 6);
//!     Ok(())
//! }
//! ```

mod chan;
mod combinators;
mod config;
mod core;
mod error;
mod events;
mod policies;
mod subscribers;

// ---- Public re-exports ----

pub use chan::{channel, Receiver, Sender};
pub use combinators::{collect, gather_in_order, join_all, parallel_map};
pub use config::SupervisorConfig;
pub use crate::core::{global, supervise, AbortState, Context, ErrorMode, Restarter, TaskHandle};
pub use error::SupError;
pub use events::{Bus, Event, EventKind};
pub use policies::RestartBackoff;
pub use subscribers::{Subscribe, SubscriberSet};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
