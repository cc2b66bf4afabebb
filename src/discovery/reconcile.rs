//! Generation diffing.
//!
//! ```text
//! current ─┬─ removed = current − new ──► "removed" (current data), dropped
//!          ├─ added   = new − current ──► "added"   (new data),     carried
//! new ─────┴─ common  = current ∩ new
//!                ├─ stale   (time + 2·ttl < now) ──► "added" (new data), new carried
//!                └─ healthy                      ──► no event,          current carried
//! ```
//!
//! A stale entry is re-armed with `"added"` and no `"removed"` is emitted for
//! it first. Watchers that only react to `"removed"` never observe a removal
//! for an entry that went stale and recovered; this is intentional, it avoids
//! flapping.

use std::collections::BTreeMap;

use crate::discovery::{DISCOVERY_TAG, ServiceDescriptor};
use crate::event::{Event, EventKey};

/// State of membership events for a newly seen or re-armed entry.
pub const ADDED: &str = "added";
/// State of membership events for an entry that disappeared.
pub const REMOVED: &str = "removed";

/// When an entry was observed and how long the observation holds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Membership {
    pub ttl: f64,
    pub time: f64,
}

impl Membership {
    /// Stale once twice the ttl has elapsed since `time`.
    pub fn is_stale(&self, now: f64) -> bool {
        self.time + 2.0 * self.ttl < now
    }
}

/// One observation of the inventory, keyed by `(host, service)`.
pub type Generation = BTreeMap<EventKey, Membership>;

/// Result of [`reconcile`].
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    /// State to reconcile against next cycle.
    pub next: Generation,
    /// Membership events, removals first, then additions in key order.
    pub events: Vec<Event>,
}

/// Expands inventory descriptors into a generation observed at `now`.
pub fn generation(descriptors: &[ServiceDescriptor], now: f64) -> Generation {
    descriptors
        .iter()
        .flat_map(|d| {
            d.hosts.iter().map(move |host| {
                (
                    EventKey::new(host.as_str(), d.service.as_str()),
                    Membership { ttl: d.ttl, time: now },
                )
            })
        })
        .collect()
}

/// Diffs two generations at `now`.
pub fn reconcile(current: &Generation, new: &Generation, now: f64) -> Reconciliation {
    let mut events = Vec::new();
    let mut next = Generation::new();

    for (key, membership) in current {
        if !new.contains_key(key) {
            events.push(membership_event(key, membership, REMOVED));
        }
    }

    for (key, fresh) in new {
        match current.get(key) {
            Some(live) if !live.is_stale(now) => {
                next.insert(key.clone(), *live);
            }
            _ => {
                events.push(membership_event(key, fresh, ADDED));
                next.insert(key.clone(), *fresh);
            }
        }
    }

    Reconciliation { next, events }
}

/// Membership event for `key`, tagged as discovery output.
pub fn membership_event(key: &EventKey, membership: &Membership, state: &str) -> Event {
    Event::new()
        .with_host(key.host.as_str())
        .with_service(key.service.as_str())
        .with_state(state)
        .with_time(membership.time)
        .with_ttl(membership.ttl)
        .with_tag(DISCOVERY_TAG)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(ttl: f64, time: f64) -> Membership {
        Membership { ttl, time }
    }

    fn key(h: &str, s: &str) -> EventKey {
        EventKey::new(h, s)
    }

    #[test]
    fn test_healthy_entries_are_kept_and_new_ones_added() {
        let current = Generation::from([(key("h1", "s1"), m(10.0, 100.0))]);
        let new = Generation::from([
            (key("h1", "s1"), m(10.0, 100.0)),
            (key("h2", "s2"), m(10.0, 150.0)),
        ]);

        let out = reconcile(&current, &new, 105.0);
        assert_eq!(
            out.next,
            Generation::from([
                (key("h1", "s1"), m(10.0, 100.0)),
                (key("h2", "s2"), m(10.0, 150.0)),
            ])
        );
        assert_eq!(out.events.len(), 1);
        let added = &out.events[0];
        assert_eq!(added.key(), key("h2", "s2"));
        assert_eq!(added.state.as_deref(), Some(ADDED));
        assert_eq!(added.time, Some(150.0));
        assert_eq!(added.ttl, Some(10.0));
        assert!(added.has_tag(DISCOVERY_TAG));
    }

    #[test]
    fn test_stale_entries_are_re_armed_without_removal() {
        let current = Generation::from([(key("h1", "s1"), m(10.0, 50.0))]);
        let new = Generation::from([(key("h1", "s1"), m(10.0, 50.0))]);

        let out = reconcile(&current, &new, 100.0);
        assert_eq!(out.events.len(), 1);
        assert_eq!(out.events[0].state.as_deref(), Some(ADDED));
        assert_eq!(out.next, new);
    }

    #[test]
    fn test_stale_re_arm_carries_the_new_observation() {
        let current = Generation::from([(key("h1", "s1"), m(10.0, 50.0))]);
        let new = Generation::from([(key("h1", "s1"), m(5.0, 99.0))]);

        let out = reconcile(&current, &new, 100.0);
        assert_eq!(out.events[0].time, Some(99.0));
        assert_eq!(out.next[&key("h1", "s1")], m(5.0, 99.0));
    }

    #[test]
    fn test_staleness_boundary_is_strict() {
        let current = Generation::from([(key("h", "s"), m(10.0, 80.0))]);
        assert!(reconcile(&current, &current, 100.0).events.is_empty());
        assert_eq!(reconcile(&current, &current, 100.5).events.len(), 1);
    }

    #[test]
    fn test_removed_entries_carry_current_data_and_are_dropped() {
        let current = Generation::from([
            (key("h1", "s1"), m(10.0, 100.0)),
            (key("h2", "s2"), m(30.0, 90.0)),
        ]);
        let new = Generation::from([(key("h1", "s1"), m(10.0, 104.0))]);

        let out = reconcile(&current, &new, 105.0);
        assert_eq!(out.events.len(), 1);
        let removed = &out.events[0];
        assert_eq!(removed.key(), key("h2", "s2"));
        assert_eq!(removed.state.as_deref(), Some(REMOVED));
        assert_eq!(removed.time, Some(90.0));
        assert_eq!(removed.ttl, Some(30.0));
        assert!(!out.next.contains_key(&key("h2", "s2")));
        assert_eq!(out.next[&key("h1", "s1")], m(10.0, 100.0));
    }

    #[test]
    fn test_generation_expands_hosts() {
        let gen_ = generation(
            &[ServiceDescriptor {
                hosts: vec!["a".into(), "b".into()],
                ttl: 60.0,
                service: "web".into(),
            }],
            7.0,
        );
        assert_eq!(gen_.len(), 2);
        assert_eq!(gen_[&key("b", "web")], m(60.0, 7.0));
    }
}
