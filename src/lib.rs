//! # corevisor
//!
//! **Corevisor** is the live-reloadable runtime core of an event-stream
//! monitoring engine.
//!
//! It holds a fleet of long-lived stateful services (an index of current event
//! state, a publish/subscribe registry, periodic tasks, listeners) described by
//! an immutable [`Core`] snapshot, and replaces the whole configuration at
//! runtime without dropping live services whose identity did not change.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   configuration ──► Core (streams, services, index, pubsub, metrics sink)
//!                          │
//!                          ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Supervisor (single owner of the live core)                       │
//! │  - ArcSwap<Core> (current live core, lock-free reads)             │
//! │  - transition lock (one transition at a time)                     │
//! │  - Bus (broadcast signals)                                        │
//! │  - SubscriberSet (fans out to LiveTracker + user subscribers)     │
//! └──────┬──────────────────────────────────────────────┬─────────────┘
//!        │ transition(old, new)                         │ stream(event)
//!        ▼                                              ▼
//!  merge ─► stop ─► reload ─► start           handler 1 ─► ... ─► handler N
//!  (pure)  (parallel, joined per phase)          │
//!                                                ├─► WrappedIndex ─► Index (+ "index" channel)
//!        ┌───────────────────────────┐           └─► PubSub channels
//!        │ PeriodicService           │
//!        │  ├─ Reaper     ──────────────► expired events ─┐
//!        │  ├─ Discovery  ──────────────► added/removed ──┼─► Core::stream (reinjection)
//!        │  └─ Sampler    ──────────────► self-metrics ───┘
//!        └───────────────────────────┘
//! ```
//!
//! ### Transition
//! ```text
//! old ──┐
//!       ├─► merge: keep old instance of every equivalent service, index, pubsub
//! new ──┘        │
//!                ├─► stop   old services with no equivalent in merged
//!                ├─► reload merged services with the merged core
//!                └─► start  merged services (no-op for running ones)
//! ```
//!
//! ## Features
//! | Area              | Description                                                   | Key types / traits                          |
//! |-------------------|---------------------------------------------------------------|---------------------------------------------|
//! | **Core**          | Immutable snapshot, conflict rules, event dispatch            | [`Core`], [`CoreBuilder`], [`StreamFn`]     |
//! | **Transitions**   | Merge and stop/reload/start choreography                      | [`transition`], [`bootstrap`], [`merge`]    |
//! | **Supervision**   | Live-core owner, graceful shutdown                            | [`Supervisor`], [`SupervisorBuilder`]       |
//! | **Services**      | Lifecycle capability and timer-driven services                | [`Service`], [`PeriodicService`], [`Tick`]  |
//! | **Index**         | Latest event per host/service, validation, fan-out            | [`Index`], [`MemoryIndex`], [`WrappedIndex`]|
//! | **Expiry**        | Periodic TTL reaping with reinjection                         | [`Reaper`], [`reaper`]                      |
//! | **Discovery**     | Inventory reconciliation into membership events               | [`reconcile`], [`Discovery`], [`discovery`] |
//! | **Signals**       | Self-instrumentation bus and subscribers                      | [`Bus`], [`Signal`], [`Subscribe`]          |
//! | **Errors**        | Typed errors with stable labels                               | [`ConflictError`], [`ValidationError`], ... |
//!
//! ## Optional features
//! - `logging`: exports the `tracing`-backed [`LogWriter`] signal subscriber.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use corevisor::{
//!     Config, Core, Event, MemoryIndex, PubSub, ReaperConfig, SupervisorBuilder, SystemClock,
//!     index_stream, reaper,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let sup = SupervisorBuilder::new(Config::default()).build();
//!     let clock = SystemClock::arc();
//!
//!     let core = Core::builder()
//!         .index(Arc::new(MemoryIndex::new(clock.clone())))
//!         .pubsub(Arc::new(PubSub::new()))
//!         .stream(index_stream())
//!         .build()
//!         .add_service(Arc::new(reaper(ReaperConfig::default(), clock)), false)?;
//!
//!     let report = sup.bootstrap(core).await;
//!     assert!(report.is_clean());
//!
//!     sup.stream(&Event::new().with_host("web-1").with_service("cpu").with_time(1.0))?;
//!     sup.shutdown().await?;
//!     Ok(())
//! }
//! ```
mod clock;
mod config;
mod core;
mod discovery;
mod error;
mod event;
mod index;
mod instrumentation;
mod policies;
mod pubsub;
mod reaper;
mod service;
mod subscribers;
mod telemetry;

#[cfg(test)]
mod testing;

// ---- Public re-exports ----

pub use crate::core::{
    Core, CoreBuilder, LifecycleFailure, StreamFn, Supervisor, SupervisorBuilder, Transition,
    bootstrap, index_stream, merge, publish_stream, stream_fn, transition,
    wait_for_shutdown_signal,
};
pub use clock::{Clock, ClockRef, ManualClock, SystemClock};
pub use config::Config;
pub use discovery::{
    ADDED, DISCOVERY_TAG, Discovery, DiscoveryConfig, Generation, Inventory, Membership, REMOVED,
    Reconciliation, SERVICE_PREFIX, ServiceDescriptor, StaticInventory, derived_event, discovery,
    filter as discovery_filter, generation, membership_event, reconcile,
};
pub use error::{
    ConflictError, DiscoveryError, ProcessingError, RuntimeError, ServiceError, TickError,
    ValidationError,
};
pub use event::{EXPIRED, Event, EventKey, Query};
pub use index::{DEFAULT_TTL, INDEX_CHANNEL, Index, MemoryIndex, WrappedIndex};
pub use instrumentation::{InstrumentationConfig, Sampler, instrumentation};
pub use policies::{BackoffPolicy, JitterPolicy};
pub use pubsub::{PubSub, Subscription};
pub use reaper::{Reaped, Reaper, ReaperConfig, reaper};
pub use service::{PeriodicService, Service, ServiceId, ServiceRef, Tick, TickFn, TickRef};
pub use subscribers::{LiveTracker, Subscribe, SubscriberSet};
pub use telemetry::{Bus, Phase, Signal, SignalKind};

// Optional: expose the tracing-backed signal subscriber.
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
