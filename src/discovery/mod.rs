//! # Discovery: reconcile an external service inventory into events.
//!
//! Each cycle the discovery service fetches the inventory, expands it into a
//! [`Generation`] observed at `now`, [`reconcile`]s it against the previous
//! generation and streams the resulting membership events through the core.
//!
//! ```text
//! Inventory::fetch ──► generation(now) ──► reconcile(current, new, now)
//!                                              ├─► events ──► core.stream(event)   (each isolated)
//!                                              └─► next   ──► current
//! ```
//!
//! - Membership events carry the [`DISCOVERY_TAG`] tag and state
//!   [`ADDED`] / [`REMOVED`].
//! - [`filter`] is the companion stream handler that mirrors membership into
//!   the index under a [`SERVICE_PREFIX`]-ed service name.
//! - A failed fetch is logged and leaves the current generation untouched.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use corevisor::{
//!     Core, DiscoveryConfig, MemoryIndex, ServiceDescriptor, StaticInventory, SystemClock,
//!     discovery, discovery_filter,
//! };
//!
//! let inventory = Arc::new(StaticInventory::new(vec![ServiceDescriptor {
//!     hosts: vec!["db-1".into(), "db-2".into()],
//!     ttl: 60.0,
//!     service: "postgres".into(),
//! }]));
//!
//! let core = Core::builder()
//!     .index(Arc::new(MemoryIndex::new(SystemClock::arc())))
//!     .stream(discovery_filter())
//!     .build()
//!     .add_service(
//!         Arc::new(discovery(DiscoveryConfig::default(), inventory, SystemClock::arc())),
//!         false,
//!     )
//!     .unwrap();
//! assert_eq!(core.streams().len(), 1);
//! ```

mod filter;
mod inventory;
mod reconcile;

pub use filter::{derived_event, filter};
pub use inventory::{Inventory, ServiceDescriptor, StaticInventory};
pub use reconcile::{
    ADDED, Generation, Membership, REMOVED, Reconciliation, generation, membership_event,
    reconcile,
};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::clock::ClockRef;
use crate::core::{Core, isolate};
use crate::error::{DiscoveryError, TickError};
use crate::service::{PeriodicService, Tick};
use crate::telemetry::{Signal, SignalKind};

/// Tag carried by every membership event.
pub const DISCOVERY_TAG: &str = "discovery";

/// Prefix of the service name [`filter`] indexes for a discovered service.
pub const SERVICE_PREFIX: &str = "discovery-";

/// Discovery settings.
#[derive(Clone, Debug)]
pub struct DiscoveryConfig {
    /// Time between inventory fetches.
    pub interval: Duration,
    /// Label of the inventory source; part of the service identity.
    pub source: String,
}

impl Default for DiscoveryConfig {
    /// `interval = 60s`, `source = "static"`.
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            source: "static".to_string(),
        }
    }
}

/// One discovery cycle per tick, holding the current generation.
pub struct Discovery {
    inventory: Arc<dyn Inventory>,
    clock: ClockRef,
    current: Mutex<Generation>,
}

impl Discovery {
    pub fn new(inventory: Arc<dyn Inventory>, clock: ClockRef) -> Self {
        Self {
            inventory,
            clock,
            current: Mutex::new(Generation::new()),
        }
    }

    /// The generation the next cycle reconciles against.
    pub fn state(&self) -> Generation {
        self.current.lock().clone()
    }

    /// Fetches the inventory, reconciles and reinjects; returns the number of
    /// membership events streamed.
    pub async fn cycle(&self, core: &Core) -> Result<usize, DiscoveryError> {
        let descriptors = self.inventory.fetch().await.inspect_err(|err| {
            tracing::warn!(error = %err, label = err.as_label(), "inventory fetch failed");
        })?;
        let now = self.clock.now();
        let observed = generation(&descriptors, now);
        Ok(self.apply(core, observed, now))
    }

    /// Reconciles `observed` against the current generation, streams the
    /// membership events through `core` and stores the next generation.
    pub fn apply(&self, core: &Core, observed: Generation, now: f64) -> usize {
        let current = self.state();
        let Reconciliation { next, events } = reconcile(&current, &observed, now);

        for event in &events {
            isolate(core, "discovery", || core.stream(event));
        }
        *self.current.lock() = next;

        if !events.is_empty() {
            tracing::debug!(events = events.len(), "discovery membership changed");
            if let Some(bus) = core.bus() {
                bus.publish(Signal::new(SignalKind::DiscoveryChanged).with_count(events.len()));
            }
        }
        events.len()
    }
}

#[async_trait]
impl Tick for Discovery {
    async fn tick(&self, core: &Core, ctx: CancellationToken) -> Result<(), TickError> {
        tokio::select! {
            _ = ctx.cancelled() => Err(TickError::Canceled),
            res = self.cycle(core) => res.map(|_| ()).map_err(TickError::fail),
        }
    }
}

/// Builds the discovery service.
///
/// Discoveries with the same interval and source are equivalent; any two
/// conflict.
pub fn discovery(
    cfg: DiscoveryConfig,
    inventory: Arc<dyn Inventory>,
    clock: ClockRef,
) -> PeriodicService {
    let key = format!("{}ms:{}", cfg.interval.as_millis(), cfg.source);
    PeriodicService::new(
        "discovery",
        key,
        cfg.interval,
        Arc::new(Discovery::new(inventory, clock)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::core::stream_fn;
    use crate::event::{Event, EventKey};
    use crate::index::{Index, MemoryIndex};

    struct Broken;

    #[async_trait]
    impl Inventory for Broken {
        async fn fetch(&self) -> Result<Vec<ServiceDescriptor>, DiscoveryError> {
            Err(DiscoveryError::Unavailable {
                error: "registry down".into(),
            })
        }
    }

    fn descriptor(hosts: &[&str], service: &str) -> ServiceDescriptor {
        ServiceDescriptor {
            hosts: hosts.iter().map(|h| h.to_string()).collect(),
            ttl: 10.0,
            service: service.into(),
        }
    }

    fn core_with_log(seen: Arc<Mutex<Vec<Event>>>) -> Core {
        Core::builder()
            .index(Arc::new(MemoryIndex::new(ManualClock::new(0.0))))
            .stream(filter())
            .stream(stream_fn(move |_, ev| {
                seen.lock().push(ev.clone());
                Ok(())
            }))
            .build()
    }

    #[tokio::test]
    async fn test_cycles_stream_membership_changes() {
        let clock = ManualClock::new(100.0);
        let inventory = Arc::new(StaticInventory::new(vec![descriptor(&["h1"], "s1")]));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let core = core_with_log(seen.clone());
        let d = Discovery::new(inventory.clone(), clock.clone());

        assert_eq!(d.cycle(&core).await.unwrap(), 1);
        assert!(core.index().unwrap().lookup("h1", "discovery-s1").is_some());

        clock.set(105.0);
        inventory.replace(vec![descriptor(&["h1", "h2"], "s1")]);
        assert_eq!(d.cycle(&core).await.unwrap(), 1);
        assert_eq!(d.state()[&EventKey::new("h1", "s1")].time, 100.0);

        clock.set(110.0);
        inventory.replace(vec![descriptor(&["h2"], "s1")]);
        assert_eq!(d.cycle(&core).await.unwrap(), 1);
        assert!(core.index().unwrap().lookup("h1", "discovery-s1").is_none());
        assert!(core.index().unwrap().lookup("h2", "discovery-s1").is_some());

        let states: Vec<(String, String)> = seen
            .lock()
            .iter()
            .map(|e| (e.host.clone().unwrap(), e.state.clone().unwrap()))
            .collect();
        assert_eq!(
            states,
            vec![
                ("h1".to_string(), ADDED.to_string()),
                ("h2".to_string(), ADDED.to_string()),
                ("h1".to_string(), REMOVED.to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_fetch_failure_keeps_the_current_generation() {
        let clock = ManualClock::new(100.0);
        let core = Core::default();
        let d = Discovery::new(Arc::new(Broken), clock.clone());
        let seeded = Generation::from([(
            EventKey::new("h", "s"),
            Membership {
                ttl: 10.0,
                time: 100.0,
            },
        )]);
        d.apply(&core, seeded.clone(), 100.0);

        let err = d.cycle(&core).await.unwrap_err();
        assert_eq!(err.as_label(), "discovery_unavailable");
        assert_eq!(d.state(), seeded);
    }

    #[tokio::test]
    async fn test_failing_stream_does_not_lose_the_generation() {
        let clock = ManualClock::new(0.0);
        let core = Core::builder()
            .stream(stream_fn(|_, _| panic!("sink exploded")))
            .build();
        let inventory = Arc::new(StaticInventory::new(vec![descriptor(&["a", "b"], "s")]));
        let d = Discovery::new(inventory, clock);
        assert_eq!(d.cycle(&core).await.unwrap(), 2);
        assert_eq!(d.state().len(), 2);
    }
}
