//! Retry delay policies for periodic services.
//!
//! A periodic service normally ticks once per interval. When a tick fails the
//! next one is delayed by a [`BackoffPolicy`] so a broken inventory source or a
//! wedged index is not hammered every interval.
//!
//! ## Contents
//! - [`BackoffPolicy`] how failure delays evolve (first / factor / max + jitter)
//! - [`JitterPolicy`]  randomization strategy to avoid synchronized retries
//!
//! ## Defaults
//! - `BackoffPolicy::default()` → first=1s, factor=2.0, max=60s, jitter=None.
//! - `JitterPolicy::None` by default; consider `Equal` for balanced randomness.

mod backoff;
mod jitter;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
