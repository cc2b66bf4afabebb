//! # Signal subscribers.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out,
//! and built-in subscribers for signals broadcast on the [`Bus`](crate::telemetry::Bus).
//!
//! ## Architecture
//! ```text
//! transition / PeriodicService / Reaper ── publish(Signal) ──► Bus
//!                                                               │
//!                                         Supervisor::subscriber_listener
//!                                                               │
//!                                                        SubscriberSet::emit
//!                                                   ┌───────────┼───────────┐
//!                                                   ▼           ▼           ▼
//!                                              LiveTracker  LogWriter    Custom
//! ```
//!
//! ## Implementing custom subscribers
//! ```no_run
//! use corevisor::{Signal, SignalKind, Subscribe};
//! use async_trait::async_trait;
//!
//! struct FailureCounter;
//!
//! #[async_trait]
//! impl Subscribe for FailureCounter {
//!     async fn on_signal(&self, signal: &Signal) {
//!         if signal.kind == SignalKind::ServiceFailed {
//!             // increment a counter
//!         }
//!     }
//!     fn name(&self) -> &'static str { "failure-counter" }
//! }
//! ```

mod live;
#[cfg(feature = "logging")]
mod log;
mod set;
mod subscribe;

pub use live::LiveTracker;
#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
