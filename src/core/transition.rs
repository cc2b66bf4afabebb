//! # Core transition: merge, then stop → reload → start.
//!
//! [`merge`] is pure: it builds the core that will become live, substituting
//! the old (running) instance for every new service equivalent to one already
//! live. [`transition`] then drives the lifecycle over the merged core:
//!
//! ```text
//! old core ──┐
//!            ├─► merge ──► merged
//! new core ──┘               │
//!                            ├─► stop   old services absent from merged   (parallel, join all)
//!                            ├─► reload every merged service with merged  (parallel, join all)
//!                            └─► start  every merged service              (parallel, join all)
//! ```
//!
//! ## Rules
//! - Phases run strictly in order; every call of a phase finishes before the
//!   next phase begins.
//! - Calls within a phase are unordered and isolated: a failing or panicking
//!   call is logged, reported on the metrics sink and recorded in
//!   [`Transition::failures`], and never prevents its siblings from running.
//! - There is no rollback: the merged core is the result even when calls fail.
//! - Membership is decided by [`Service::equivalent`], never by identity.

use std::sync::Arc;

use futures::FutureExt;
use tokio::task::JoinSet;

use crate::core::Core;
use crate::error::{ServiceError, panic_info};
use crate::index::WrappedIndex;
use crate::service::{Service, ServiceId, ServiceRef};
use crate::telemetry::{Bus, Phase, Signal, SignalKind};

/// A lifecycle call that failed during a transition.
#[derive(Debug, Clone)]
pub struct LifecycleFailure {
    pub service: ServiceId,
    pub phase: Phase,
    pub error: ServiceError,
}

/// Outcome of [`transition`] or [`bootstrap`].
#[derive(Debug)]
pub struct Transition {
    /// The merged core, now live.
    pub core: Core,
    /// Old services stopped because nothing equivalent survived the merge.
    pub stopped: Vec<ServiceId>,
    pub failures: Vec<LifecycleFailure>,
}

impl Transition {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Builds the core that `old` transitions into when `new` is applied.
///
/// - every service of `new` equivalent to one of `old` is replaced by the old
///   instance; equivalent services collapse into the first one;
/// - the index and pub/sub registry are kept from `old` iff equivalent to the
///   ones declared in `new`; a component absent from `new` is dropped;
/// - the index is rewrapped so it publishes to the merged pub/sub registry;
/// - the metrics sink is `new`'s, or `old`'s when `new` declares none.
pub fn merge(old: &Core, new: &Core) -> Core {
    let old_services = old.services();
    let mut services: Vec<ServiceRef> = Vec::with_capacity(new.services().len());
    for svc in new.services() {
        if services.iter().any(|kept| kept.equivalent(svc.as_ref())) {
            continue;
        }
        let chosen = old_services
            .iter()
            .find(|live| live.equivalent(svc.as_ref()))
            .unwrap_or(svc);
        services.push(Arc::clone(chosen));
    }

    let pubsub = match (old.pubsub(), new.pubsub()) {
        (Some(live), Some(declared)) if live.equivalent(&**declared) => Some(Arc::clone(live)),
        (_, declared) => declared.cloned(),
    };

    let raw_index = match (old.index(), new.index()) {
        (Some(live), Some(declared)) if live.equivalent(&**declared) => Some(live.inner()),
        (_, declared) => declared.map(|d| d.inner()),
    };
    let index = raw_index.map(|raw| Arc::new(WrappedIndex::new(raw, pubsub.clone())));

    Core {
        streams: Arc::clone(&new.streams),
        services: services.into(),
        index,
        pubsub,
        bus: new.bus.clone().or_else(|| old.bus.clone()),
    }
}

/// Moves from the live `old` core to `new`, returning the merged core.
pub async fn transition(old: &Core, new: &Core) -> Transition {
    let merged = merge(old, new);
    let bus = merged.bus().cloned();
    let live = merged.all_services();

    let to_stop: Vec<ServiceRef> = old
        .all_services()
        .into_iter()
        .filter(|svc| !live.iter().any(|kept| kept.equivalent(svc.as_ref())))
        .collect();

    if let Some(bus) = &bus {
        bus.publish(Signal::new(SignalKind::TransitionStarted).with_count(to_stop.len()));
    }
    tracing::info!(
        stopping = to_stop.len(),
        services = live.len(),
        "core transition started"
    );

    let mut failures = Vec::new();
    let (stopped, mut failed) = fan_out(Phase::Stop, to_stop, &merged, bus.as_ref()).await;
    failures.append(&mut failed);
    let (_, mut failed) = fan_out(Phase::Reload, live.clone(), &merged, bus.as_ref()).await;
    failures.append(&mut failed);
    let (_, mut failed) = fan_out(Phase::Start, live, &merged, bus.as_ref()).await;
    failures.append(&mut failed);

    finish(merged, stopped, failures, bus.as_ref())
}

/// Brings a freshly built core live: reload + start, no stop phase.
pub async fn bootstrap(core: &Core) -> Transition {
    let bus = core.bus().cloned();
    let live = core.all_services();

    if let Some(bus) = &bus {
        bus.publish(Signal::new(SignalKind::TransitionStarted).with_count(0));
    }
    tracing::info!(services = live.len(), "core bootstrap started");

    let (_, mut failures) = fan_out(Phase::Reload, live.clone(), core, bus.as_ref()).await;
    let (_, mut failed) = fan_out(Phase::Start, live, core, bus.as_ref()).await;
    failures.append(&mut failed);

    finish(core.clone(), Vec::new(), failures, bus.as_ref())
}

fn finish(
    core: Core,
    stopped: Vec<ServiceId>,
    failures: Vec<LifecycleFailure>,
    bus: Option<&Bus>,
) -> Transition {
    if let Some(bus) = bus {
        bus.publish(Signal::new(SignalKind::TransitionCompleted).with_count(failures.len()));
    }
    if failures.is_empty() {
        tracing::info!(stopped = stopped.len(), "core transition completed");
    } else {
        tracing::warn!(
            stopped = stopped.len(),
            failures = failures.len(),
            "core transition completed with failures"
        );
    }
    Transition {
        core,
        stopped,
        failures,
    }
}

/// Runs one phase against every service concurrently and joins all calls.
///
/// Returns the ids whose call succeeded and the failures.
async fn fan_out(
    phase: Phase,
    services: Vec<ServiceRef>,
    core: &Core,
    bus: Option<&Bus>,
) -> (Vec<ServiceId>, Vec<LifecycleFailure>) {
    let mut set = JoinSet::new();
    for svc in services {
        let core = core.clone();
        set.spawn(async move {
            let id = svc.id();
            let call = async {
                match phase {
                    Phase::Stop => svc.stop().await,
                    Phase::Reload => svc.reload(&core).await,
                    Phase::Start => svc.start().await,
                }
            };
            let outcome = std::panic::AssertUnwindSafe(call)
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| {
                    Err(ServiceError::Panicked {
                        info: panic_info(&*panic),
                    })
                });
            (id, outcome)
        });
    }

    let mut succeeded = Vec::new();
    let mut failures = Vec::new();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((id, Ok(()))) => {
                if let Some(bus) = bus {
                    bus.publish(Signal::new(success_kind(phase)).with_service(id.to_string()));
                }
                succeeded.push(id);
            }
            Ok((id, Err(error))) => {
                tracing::error!(
                    service = %id,
                    phase = phase.as_str(),
                    label = error.as_label(),
                    error = %error,
                    "service lifecycle call failed"
                );
                if let Some(bus) = bus {
                    bus.publish(
                        Signal::new(SignalKind::ServiceFailed)
                            .with_service(id.to_string())
                            .with_phase(phase)
                            .with_reason(error.to_string()),
                    );
                }
                failures.push(LifecycleFailure {
                    service: id,
                    phase,
                    error,
                });
            }
            Err(join_err) => {
                tracing::error!(phase = phase.as_str(), error = %join_err, "lifecycle task aborted");
            }
        }
    }
    (succeeded, failures)
}

fn success_kind(phase: Phase) -> SignalKind {
    match phase {
        Phase::Stop => SignalKind::ServiceStopped,
        Phase::Reload => SignalKind::ServiceReloaded,
        Phase::Start => SignalKind::ServiceStarted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::event::Event;
    use crate::index::{Index, MemoryIndex};
    use crate::pubsub::PubSub;
    use crate::testing::{Journal, Probe};

    fn core_of(services: Vec<ServiceRef>) -> Core {
        services
            .into_iter()
            .try_fold(Core::default(), |core, svc| core.add_service(svc, false))
            .unwrap()
    }

    fn sorted(journal: &Journal) -> Vec<String> {
        let mut calls = journal.lock().clone();
        calls.sort();
        calls
    }

    #[tokio::test]
    async fn test_transition_to_itself_stops_nothing_and_keeps_instances() {
        let journal = Journal::default();
        let a = Probe::new("a").journal(&journal).arc();
        let b = Probe::new("b").journal(&journal).arc();
        let core = core_of(vec![a.clone(), b.clone()]);

        let out = transition(&core, &core).await;
        assert!(out.is_clean());
        assert!(out.stopped.is_empty());
        assert_eq!(out.core.services().len(), 2);
        for (kept, orig) in out.core.services().iter().zip(core.services()) {
            assert!(Arc::ptr_eq(kept, orig));
        }
        assert!(!journal.lock().iter().any(|c| c.starts_with("stop:")));
    }

    #[tokio::test]
    async fn test_duplicate_declarations_share_one_lifecycle() {
        let journal = Journal::default();
        let live = Probe::new("a").journal(&journal).arc();
        let old = core_of(vec![live.clone()]);
        let new = core_of(vec![Probe::new("a").arc(), Probe::new("a").arc()]);

        let out = transition(&old, &new).await;
        assert!(out.is_clean());
        assert_eq!(out.core.services().len(), 1);
        let kept: ServiceRef = live.clone();
        assert!(Arc::ptr_eq(&out.core.services()[0], &kept));
        assert_eq!(live.calls(), vec!["reload:a".to_string(), "start:a".to_string()]);
    }

    #[tokio::test]
    async fn test_equivalent_services_survive_and_abandoned_ones_stop() {
        let journal = Journal::default();
        let a = Probe::new("a").journal(&journal).arc();
        let b = Probe::new("b").journal(&journal).arc();
        let b2 = Probe::new("b").label("b2").journal(&journal).arc();
        let c = Probe::new("c").journal(&journal).arc();

        let old = core_of(vec![a.clone(), b.clone()]);
        let new = core_of(vec![b2.clone(), c.clone()]);

        let out = transition(&old, &new).await;
        assert!(out.is_clean());
        assert_eq!(out.stopped, vec![a.id()]);

        let live: Vec<&ServiceRef> = out.core.services().iter().collect();
        assert!(Arc::ptr_eq(live[0], &(b.clone() as ServiceRef)));
        assert!(Arc::ptr_eq(live[1], &(c.clone() as ServiceRef)));

        assert_eq!(
            sorted(&journal),
            vec!["reload:b", "reload:c", "start:b", "start:c", "stop:a"]
        );
        assert_eq!(b.reloaded_with(), vec![b.id(), c.id()]);
        assert!(b2.calls().is_empty());
    }

    #[tokio::test]
    async fn test_phases_run_in_order() {
        let journal = Journal::default();
        let old = core_of(vec![Probe::new("a").journal(&journal).arc()]);
        let new = core_of(vec![
            Probe::new("x").journal(&journal).arc(),
            Probe::new("y").journal(&journal).arc(),
        ]);
        transition(&old, &new).await;

        let calls = journal.lock().clone();
        let phase_of = |c: &String| match c.split(':').next() {
            Some("stop") => 0,
            Some("reload") => 1,
            _ => 2,
        };
        let phases: Vec<u8> = calls.iter().map(phase_of).collect();
        let mut ordered = phases.clone();
        ordered.sort();
        assert_eq!(phases, ordered);
    }

    #[tokio::test]
    async fn test_failing_calls_do_not_block_siblings() {
        let journal = Journal::default();
        let bus = Bus::new(64);
        let mut rx = bus.subscribe();
        let new = core_of(vec![
            Probe::new("bad").failing(Phase::Start).journal(&journal).arc(),
            Probe::new("worse").panicking(Phase::Reload).journal(&journal).arc(),
            Probe::new("good").journal(&journal).arc(),
        ]);
        let new = Core {
            bus: Some(bus),
            ..new
        };

        let out = transition(&Core::default(), &new).await;
        assert_eq!(out.failures.len(), 2);
        assert!(out.failures.iter().any(|f| f.phase == Phase::Start
            && f.service.key() == "bad"
            && f.error.as_label() == "service_failed"));
        assert!(out.failures.iter().any(|f| f.phase == Phase::Reload
            && f.service.key() == "worse"
            && f.error.as_label() == "service_panicked"));
        assert!(journal.lock().contains(&"start:good".to_string()));
        assert!(journal.lock().contains(&"start:worse".to_string()));
        assert_eq!(out.core.services().len(), 3);

        let mut kinds = Vec::new();
        while let Ok(sig) = rx.try_recv() {
            kinds.push(sig.kind);
        }
        assert_eq!(kinds.first(), Some(&SignalKind::TransitionStarted));
        assert_eq!(kinds.last(), Some(&SignalKind::TransitionCompleted));
        assert_eq!(
            kinds.iter().filter(|k| **k == SignalKind::ServiceFailed).count(),
            2
        );
    }

    #[tokio::test]
    async fn test_index_contents_survive_a_reload() {
        let clock = ManualClock::new(100.0);
        let old = Core::builder()
            .index(Arc::new(MemoryIndex::new(clock.clone())))
            .build();
        let booted = bootstrap(&old).await;
        booted
            .core
            .index()
            .unwrap()
            .insert(Event::new().with_host("h").with_service("s").with_time(100.0))
            .unwrap();

        let pubsub = Arc::new(PubSub::new());
        let new = Core::builder()
            .index(Arc::new(MemoryIndex::new(clock)))
            .pubsub(pubsub.clone())
            .build();
        let out = transition(&booted.core, &new).await;

        assert!(out.stopped.is_empty());
        let index = out.core.index().unwrap();
        assert!(index.lookup("h", "s").is_some());
        assert!(Arc::ptr_eq(index.pubsub().unwrap(), &pubsub));
    }

    #[tokio::test]
    async fn test_dropping_the_index_stops_it() {
        let old = Core::builder()
            .index(Arc::new(MemoryIndex::new(ManualClock::new(0.0))))
            .build();
        let out = transition(&old, &Core::default()).await;
        assert!(out.core.index().is_none());
        assert_eq!(out.stopped.len(), 1);
        assert_eq!(out.stopped[0].kind(), "memory-index");
    }

    #[test]
    fn test_metrics_sink_defaults_to_old() {
        let bus = Bus::new(4);
        let old = Core::builder().bus(bus).build();
        assert!(merge(&old, &Core::default()).bus().is_some());
        assert!(merge(&Core::default(), &Core::default()).bus().is_none());
    }

    #[tokio::test]
    async fn test_bootstrap_reloads_and_starts_everything() {
        let journal = Journal::default();
        let p = Probe::new("p").journal(&journal).arc();
        let out = bootstrap(&core_of(vec![p.clone()])).await;
        assert!(out.is_clean());
        assert_eq!(sorted(&journal), vec!["reload:p", "start:p"]);
        assert!(p.is_running());
    }
}
