//! Self-instrumentation: runtime signals and the broadcast bus that carries them.
//!
//! The bus is the core's *metrics sink*. Transitions, service lifecycle calls,
//! periodic ticks, the reaper and discovery all publish [`Signal`]s on it;
//! subscribers (see [`crate::subscribers`]) turn them into logs, liveness state
//! or metrics.
//!
//! ## Contents
//! - [`SignalKind`], [`Signal`] classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `core::transition`, `PeriodicService`, `Reaper`,
//!   `Discovery`, `Supervisor`, `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: `Supervisor::subscriber_listener()` (fans out to
//!   `SubscriberSet`, which feeds `LiveTracker` and user subscribers).

mod bus;
mod signal;

pub use bus::Bus;
pub use signal::{Phase, Signal, SignalKind};
