//! # Reaper: periodic expiry of stale index entries.
//!
//! Every `interval` the reaper drains the index's expired entries and turns
//! each into a synthetic event:
//!
//! ```text
//! index.expire() ──► [entry 1, entry 2, ...]
//!                        │
//!                        ├─ project(keep_keys)
//!                        ├─ state = "expired", time = now
//!                        ├─ pubsub.publish("index", event)   (if a registry exists)
//!                        └─ core.stream(event)
//! ```
//!
//! The direct publish on `"index"` happens whether or not a stream handler
//! also publishes there, so pair the reaper with `publish_stream` on other
//! channels only.
//!
//! Each entry is processed in isolation: a failure or panic while handling one
//! is logged and counted, and the remaining entries are still processed.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use corevisor::{Core, MemoryIndex, ReaperConfig, SystemClock, reaper};
//!
//! let core = Core::builder()
//!     .index(Arc::new(MemoryIndex::new(SystemClock::arc())))
//!     .build()
//!     .add_service(Arc::new(reaper(ReaperConfig::default(), SystemClock::arc())), false)
//!     .unwrap();
//! assert_eq!(core.services().len(), 1);
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::clock::ClockRef;
use crate::core::{Core, isolate};
use crate::error::TickError;
use crate::event::{EXPIRED, Event};
use crate::index::{INDEX_CHANNEL, Index};
use crate::service::{PeriodicService, Tick};
use crate::telemetry::{Signal, SignalKind};

/// Reaper settings.
#[derive(Clone, Debug)]
pub struct ReaperConfig {
    /// Time between expiry passes.
    pub interval: Duration,
    /// Fields copied from an expiring entry into the synthetic event.
    pub keep_keys: Vec<String>,
}

impl Default for ReaperConfig {
    /// `interval = 10s`, `keep_keys = [host, service]`.
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            keep_keys: vec!["host".to_string(), "service".to_string()],
        }
    }
}

/// Outcome of one expiry pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Reaped {
    /// Entries drained from the index.
    pub expired: usize,
    /// Entries whose processing failed.
    pub failed: usize,
}

/// Expiry pass run by the reaper service.
pub struct Reaper {
    keep_keys: Arc<[String]>,
    clock: ClockRef,
}

impl Reaper {
    pub fn new(keep_keys: Vec<String>, clock: ClockRef) -> Self {
        Self {
            keep_keys: keep_keys.into(),
            clock,
        }
    }

    /// Synthetic event replacing an expired entry.
    pub fn expired_event(&self, entry: &Event, now: f64) -> Event {
        let mut event = entry.project(&self.keep_keys[..]);
        event.state = Some(EXPIRED.to_string());
        event.time = Some(now);
        event
    }

    /// Drains `core`'s index and reinjects one expired event per entry.
    pub fn reap(&self, core: &Core) -> Reaped {
        let Some(index) = core.index() else {
            return Reaped::default();
        };
        let entries = index.expire();
        if entries.is_empty() {
            return Reaped::default();
        }
        let now = self.clock.now();

        let mut failed = 0;
        for entry in &entries {
            let ok = isolate(core, "reaper", || {
                let event = self.expired_event(entry, now);
                if let Some(pubsub) = core.pubsub() {
                    pubsub.publish(INDEX_CHANNEL, &event);
                }
                core.stream(&event)
            });
            if !ok {
                failed += 1;
            }
        }

        tracing::debug!(expired = entries.len(), failed, "reaped expired entries");
        if let Some(bus) = core.bus() {
            bus.publish(Signal::new(SignalKind::EntriesExpired).with_count(entries.len()));
        }
        Reaped {
            expired: entries.len(),
            failed,
        }
    }
}

#[async_trait]
impl Tick for Reaper {
    async fn tick(&self, core: &Core, ctx: CancellationToken) -> Result<(), TickError> {
        if ctx.is_cancelled() {
            return Err(TickError::Canceled);
        }
        self.reap(core);
        Ok(())
    }
}

/// Builds the reaper service.
///
/// Reapers with the same configuration are equivalent; any two reapers
/// conflict, so a forced add of a reconfigured reaper replaces the old one.
pub fn reaper(cfg: ReaperConfig, clock: ClockRef) -> PeriodicService {
    let key = format!("{}ms:{}", cfg.interval.as_millis(), cfg.keep_keys.join(","));
    PeriodicService::new(
        "reaper",
        key,
        cfg.interval,
        Arc::new(Reaper::new(cfg.keep_keys, clock)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::core::{bootstrap, stream_fn};
    use crate::error::ProcessingError;
    use crate::index::MemoryIndex;
    use crate::pubsub::PubSub;
    use crate::service::Service;
    use crate::telemetry::Bus;
    use parking_lot::Mutex;

    fn recording_core(
        clock: Arc<ManualClock>,
        seen: Arc<Mutex<Vec<Event>>>,
    ) -> (Core, Arc<PubSub>) {
        let pubsub = Arc::new(PubSub::new());
        let core = Core::builder()
            .index(Arc::new(MemoryIndex::new(clock)))
            .pubsub(pubsub.clone())
            .stream(stream_fn(move |_, ev| {
                seen.lock().push(ev.clone());
                Ok(())
            }))
            .build();
        (core, pubsub)
    }

    #[test]
    fn test_expired_entry_becomes_a_projected_expired_event() {
        let clock = ManualClock::new(1000.0);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (core, pubsub) = recording_core(clock.clone(), seen.clone());
        let mut on_index = pubsub.subscribe(INDEX_CHANNEL, true);

        core.index()
            .unwrap()
            .inner()
            .insert(
                Event::new()
                    .with_host("h1")
                    .with_service("s1")
                    .with_ttl(60.0)
                    .with_time(100.0)
                    .with_metric(42.0)
                    .with_description("disk full")
                    .with_tag("prod"),
            )
            .unwrap();

        let reaped = Reaper::new(ReaperConfig::default().keep_keys, clock).reap(&core);
        assert_eq!(reaped, Reaped { expired: 1, failed: 0 });

        let expected = Event::new()
            .with_host("h1")
            .with_service("s1")
            .with_state("expired")
            .with_time(1000.0);
        assert_eq!(*seen.lock(), vec![expected.clone()]);
        assert_eq!(on_index.try_recv(), Some(expected));
        assert!(on_index.try_recv().is_none());
        assert!(core.index().unwrap().is_empty());
    }

    #[test]
    fn test_one_failing_entry_does_not_stop_the_batch() {
        let clock = ManualClock::new(1000.0);
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let processed = Arc::new(Mutex::new(Vec::new()));
        let p = processed.clone();
        let core = Core::builder()
            .index(Arc::new(MemoryIndex::new(clock.clone())))
            .bus(bus)
            .stream(stream_fn(move |_, ev| {
                if ev.host.as_deref() == Some("bad") {
                    return Err(ProcessingError::stream("downstream rejected"));
                }
                p.lock().push(ev.host.clone());
                Ok(())
            }))
            .build();
        let index = core.index().unwrap();
        for host in ["a", "bad", "c"] {
            index
                .insert(Event::new().with_host(host).with_service("s").with_time(0.0))
                .unwrap();
        }

        let reaped = Reaper::new(vec!["host".into()], clock).reap(&core);
        assert_eq!(reaped, Reaped { expired: 3, failed: 1 });
        assert_eq!(
            *processed.lock(),
            vec![Some("a".to_string()), Some("c".to_string())]
        );

        let failed = rx.try_recv().unwrap();
        assert_eq!(failed.kind, SignalKind::ProcessingFailed);
        assert_eq!(failed.service.as_deref(), Some("reaper"));
        let summary = rx.try_recv().unwrap();
        assert_eq!(summary.kind, SignalKind::EntriesExpired);
        assert_eq!(summary.count, Some(3));
    }

    #[test]
    fn test_expiry_reaches_index_channel_once_per_publisher() {
        let clock = ManualClock::new(1000.0);
        let pubsub = Arc::new(PubSub::new());
        let mut on_index = pubsub.subscribe(INDEX_CHANNEL, true);
        let mut on_all = pubsub.subscribe("all", true);
        let core = Core::builder()
            .index(Arc::new(MemoryIndex::new(clock.clone())))
            .pubsub(pubsub)
            .stream(crate::core::publish_stream("all"))
            .build();
        core.index()
            .unwrap()
            .inner()
            .insert(Event::new().with_host("h").with_service("s").with_time(1.0))
            .unwrap();

        Reaper::new(vec!["host".into()], clock).reap(&core);
        assert!(on_index.try_recv().is_some());
        assert!(on_index.try_recv().is_none());
        assert!(on_all.try_recv().is_some());
        assert!(on_all.try_recv().is_none());
    }

    #[test]
    fn test_no_index_no_work() {
        let reaper = Reaper::new(vec![], ManualClock::new(0.0));
        assert_eq!(reaper.reap(&Core::default()), Reaped::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_on_its_interval_once_live() {
        let clock = ManualClock::new(1000.0);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (core, _) = recording_core(clock.clone(), seen.clone());
        let svc = Arc::new(reaper(ReaperConfig::default(), clock));
        let core = core.add_service(svc.clone(), false).unwrap();
        core.index()
            .unwrap()
            .insert(Event::new().with_host("h").with_service("s").with_time(1.0))
            .unwrap();

        let out = bootstrap(&core).await;
        assert!(out.is_clean());
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(seen.lock().is_empty());

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(seen.lock().len(), 1);
        svc.stop().await.unwrap();
    }

    #[test]
    fn test_configuration_drives_identity() {
        let clock = ManualClock::new(0.0);
        let a = reaper(ReaperConfig::default(), clock.clone());
        let b = reaper(ReaperConfig::default(), clock.clone());
        let c = reaper(
            ReaperConfig {
                interval: Duration::from_secs(1),
                ..ReaperConfig::default()
            },
            clock,
        );
        assert!(a.equivalent(&b));
        assert!(!a.equivalent(&c));
        assert!(a.conflicts(&c));
    }
}
