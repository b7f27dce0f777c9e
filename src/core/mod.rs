//! Supervision core: contexts, task wrappers, and the restarting supervisor.

pub(crate) mod context;
pub(crate) mod handle;
pub(crate) mod restart;

pub use context::{global, AbortState, Context};
pub use handle::{ErrorMode, TaskHandle};
pub use restart::{supervise, Restarter};
