//! # Supervisor: the single owner of the live core.
//!
//! The [`Supervisor`] holds the current [`Core`] behind an atomically swapped
//! reference, serializes transitions, owns the signal [`Bus`] and fans signals
//! out to subscribers.
//!
//! ## Architecture
//! ```text
//! transition_to(new)
//!   └─► lock transitions ─► old = current ─► transition(old, new) ─► current = merged
//!
//! stream(event) ─► current.load() ─► Core::stream(event)      (lock-free, concurrent)
//!
//! signals:
//!   transition / PeriodicService / Reaper / Discovery ── publish ──► Bus
//!        Bus ──► subscriber_listener ──► SubscriberSet::emit ──► LiveTracker, LogWriter, ...
//!
//! shutdown():
//!   └─► Bus.publish(ShutdownRequested)
//!   └─► current = empty; spawn(transition(old, empty))
//!   └─► timeout(grace, handle)
//!          ├─ Ok       → Bus.publish(AllStoppedWithin)
//!          └─ Timeout  → Bus.publish(GraceExceeded)   (stop calls keep running)
//!                        RuntimeError::GraceExceeded { stuck: LiveTracker.snapshot() }
//! ```
//!
//! ## Rules
//! - Exactly one transition runs at a time.
//! - Readers never block: `current()` and `stream()` see either the old or the
//!   merged core, never a partially applied one.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use corevisor::{
//!     Config, Core, Event, Index, MemoryIndex, PubSub, SupervisorBuilder, SystemClock,
//!     index_stream,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let sup = SupervisorBuilder::new(Config::default()).build();
//!
//!     let core = Core::builder()
//!         .index(Arc::new(MemoryIndex::new(SystemClock::arc())))
//!         .pubsub(Arc::new(PubSub::new()))
//!         .stream(index_stream())
//!         .build();
//!     sup.transition_to(core).await;
//!
//!     sup.stream(&Event::new().with_host("web-1").with_service("cpu").with_time(1.0))?;
//!     assert!(sup.current().index().unwrap().lookup("web-1", "cpu").is_some());
//!
//!     sup.shutdown().await?;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::{Mutex, broadcast::error::RecvError};

use crate::core::{Core, Transition, bootstrap, shutdown, transition};
use crate::error::{ProcessingError, RuntimeError};
use crate::event::Event;
use crate::subscribers::{LiveTracker, SubscriberSet};
use crate::{
    config::Config,
    telemetry::{Bus, Signal, SignalKind},
};

/// Owns the live core, the signal bus and the subscriber fan-out.
pub struct Supervisor {
    cfg: Config,
    bus: Bus,
    subs: Arc<SubscriberSet>,
    live: Arc<LiveTracker>,
    current: ArcSwap<Core>,
    transitions: Mutex<()>,
}

impl Supervisor {
    /// Creates a supervisor holding an empty core wired to `bus`.
    pub(crate) fn new_internal(
        cfg: Config,
        bus: Bus,
        subs: Arc<SubscriberSet>,
        live: Arc<LiveTracker>,
    ) -> Self {
        let empty = Core::builder().bus(bus.clone()).build();
        Self {
            cfg,
            bus,
            subs,
            live,
            current: ArcSwap::from_pointee(empty),
            transitions: Mutex::new(()),
        }
    }

    /// Returns the live core.
    pub fn current(&self) -> Arc<Core> {
        self.current.load_full()
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Services that reported a start and no stop since, sorted.
    pub fn live_services(&self) -> Vec<String> {
        self.live.snapshot()
    }

    /// Brings `core` live through the reload + start path and makes it current.
    ///
    /// Falls back to a full transition when services are already live.
    pub async fn bootstrap(&self, core: Core) -> Transition {
        let _guard = self.transitions.lock().await;
        let old = self.current.load_full();
        let core = match core.bus {
            Some(_) => core,
            None => Core {
                bus: Some(self.bus.clone()),
                ..core
            },
        };
        let out = if old.all_services().is_empty() {
            bootstrap(&core).await
        } else {
            transition(&old, &core).await
        };
        self.current.store(Arc::new(out.core.clone()));
        out
    }

    /// Transitions the live core to `new` and makes the merged core current.
    ///
    /// A core without a metrics sink inherits the supervisor bus.
    pub async fn transition_to(&self, new: Core) -> Transition {
        let _guard = self.transitions.lock().await;
        let old = self.current.load_full();
        let out = transition(&old, &new).await;
        self.current.store(Arc::new(out.core.clone()));
        out
    }

    /// Dispatches `event` through the live core's streams.
    pub fn stream(&self, event: &Event) -> Result<(), ProcessingError> {
        self.current.load().stream(event)
    }

    /// Bootstraps `core`, then runs until an OS termination signal arrives and
    /// shuts down gracefully.
    pub async fn run(&self, core: Core) -> Result<(), RuntimeError> {
        self.bootstrap(core).await;
        if let Err(err) = shutdown::wait_for_shutdown_signal().await {
            tracing::error!(error = %err, "failed to listen for shutdown signals");
        }
        self.shutdown().await
    }

    /// Stops every live service within [`Config::grace`].
    ///
    /// The live core is replaced by an empty one either way. Stop calls still
    /// in flight when grace runs out keep running in the background until
    /// they complete; grace only decides the result.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        self.bus.publish(Signal::new(SignalKind::ShutdownRequested));
        let grace = self.cfg.grace;

        let _guard = self.transitions.lock().await;
        let old = self.current.load_full();
        let empty = Core::builder().bus(self.bus.clone()).build();
        self.current.store(Arc::new(empty.clone()));

        // Dropping the handle on timeout detaches the task instead of aborting it.
        let mut stopping = tokio::spawn(async move { transition(&old, &empty).await });
        let timed = tokio::time::timeout(grace, &mut stopping).await;

        match timed {
            Ok(Err(join_err)) => {
                tracing::error!(error = %join_err, "shutdown transition ended abnormally");
                Err(RuntimeError::ShutdownAborted {
                    reason: join_err.to_string(),
                })
            }
            Ok(Ok(_)) => {
                self.bus.publish(Signal::new(SignalKind::AllStoppedWithin));
                tracing::info!("all services stopped within grace");
                Ok(())
            }
            Err(_elapsed) => {
                let stuck = self.live.snapshot();
                self.bus
                    .publish(Signal::new(SignalKind::GraceExceeded).with_count(stuck.len()));
                tracing::error!(?grace, ?stuck, "shutdown grace exceeded");
                Err(RuntimeError::GraceExceeded { grace, stuck })
            }
        }
    }

    /// Subscribes to the bus and forwards signals to the subscriber set.
    pub(crate) fn subscriber_listener(&self) {
        let mut rx = self.bus.subscribe();
        let set = Arc::clone(&self.subs);
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(sig) => set.emit(&sig),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "subscriber listener lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
    }
}
