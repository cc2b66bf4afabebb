//! # Managed services.
//!
//! - [`Service`]: lifecycle capability every managed component implements
//! - [`ServiceId`]: comparable identity used for equivalence and conflicts
//! - [`Tick`], [`TickFn`]: one unit of periodic work
//! - [`PeriodicService`]: timer-driven service running a [`Tick`]
//!
//! The reaper, discovery and the instrumentation sampler are all
//! [`PeriodicService`]s; the index decorator and the pub/sub registry implement
//! [`Service`] directly.

mod periodic;
mod service;
mod tick;

pub use periodic::PeriodicService;
pub use service::{Service, ServiceId, ServiceRef};
pub use tick::{Tick, TickFn, TickRef};
