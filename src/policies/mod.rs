//! Restart timing policies.

mod backoff;

pub use backoff::RestartBackoff;
