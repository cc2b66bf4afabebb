//! # In-memory index.
//!
//! Entries live in a `BTreeMap` keyed by [`EventKey`] behind a `parking_lot`
//! read/write lock, so `expire`, `search` and `snapshot` return entries in
//! key order.
//!
//! ## Expiry
//! An entry is expired when its state is `expired`, or when
//! `time + ttl < now` (`ttl` falls back to the index default). Entries without
//! a `time` never expire.

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::clock::ClockRef;
use crate::error::{ServiceError, ValidationError};
use crate::event::{Event, EventKey, Query};
use crate::index::Index;
use crate::service::{Service, ServiceId};

/// TTL applied to events that carry none, in seconds.
pub const DEFAULT_TTL: f64 = 60.0;

/// Concurrent in-memory [`Index`].
///
/// Every `MemoryIndex` is equivalent to every other, so the live instance
/// (and its contents) survives any transition that declares an index.
pub struct MemoryIndex {
    entries: RwLock<BTreeMap<EventKey, Event>>,
    clock: ClockRef,
    default_ttl: f64,
}

impl MemoryIndex {
    pub fn new(clock: ClockRef) -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            clock,
            default_ttl: DEFAULT_TTL,
        }
    }

    pub fn with_default_ttl(mut self, ttl: f64) -> Self {
        self.default_ttl = ttl;
        self
    }

    fn is_expired(&self, event: &Event, now: f64) -> bool {
        if event.is_expired_state() {
            return true;
        }
        match event.time {
            Some(time) => time + event.ttl.unwrap_or(self.default_ttl) < now,
            None => false,
        }
    }
}

impl Index for MemoryIndex {
    fn clear(&self) {
        self.entries.write().clear();
    }

    fn delete(&self, event: &Event) {
        self.entries.write().remove(&event.key());
    }

    fn delete_exactly(&self, event: &Event) {
        let key = event.key();
        let mut entries = self.entries.write();
        if entries.get(&key) == Some(event) {
            entries.remove(&key);
        }
    }

    fn expire(&self) -> Vec<Event> {
        let now = self.clock.now();
        let mut entries = self.entries.write();
        let keys: Vec<EventKey> = entries
            .iter()
            .filter(|(_, e)| self.is_expired(e, now))
            .map(|(k, _)| k.clone())
            .collect();
        keys.iter().filter_map(|k| entries.remove(k)).collect()
    }

    fn search(&self, query: &Query) -> Vec<Event> {
        self.entries
            .read()
            .values()
            .filter(|e| query.matches(e))
            .cloned()
            .collect()
    }

    fn lookup(&self, host: &str, service: &str) -> Option<Event> {
        self.entries
            .read()
            .get(&EventKey::new(host, service))
            .cloned()
    }

    fn insert(&self, event: Event) -> Result<(), ValidationError> {
        self.entries.write().insert(event.key(), event);
        Ok(())
    }

    fn snapshot(&self) -> Vec<Event> {
        self.entries.read().values().cloned().collect()
    }

    fn len(&self) -> usize {
        self.entries.read().len()
    }
}

#[async_trait]
impl Service for MemoryIndex {
    fn id(&self) -> ServiceId {
        ServiceId::new("memory-index", "")
    }

    async fn start(&self) -> Result<(), ServiceError> {
        Ok(())
    }

    async fn stop(&self) -> Result<(), ServiceError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn ev(host: &str, service: &str, time: f64) -> Event {
        Event::new()
            .with_host(host)
            .with_service(service)
            .with_time(time)
    }

    #[test]
    fn test_expire_drains_only_elapsed_entries() {
        let clock = ManualClock::new(100.0);
        let index = MemoryIndex::new(clock.clone()).with_default_ttl(30.0);
        index.insert(ev("h1", "s1", 50.0).with_ttl(10.0)).unwrap();
        index.insert(ev("h2", "s2", 80.0)).unwrap();
        index.insert(ev("h3", "s3", 99.0).with_state("expired")).unwrap();
        index.insert(Event::new().with_host("h4")).unwrap();

        let expired: Vec<EventKey> = index.expire().iter().map(Event::key).collect();
        assert_eq!(
            expired,
            vec![EventKey::new("h1", "s1"), EventKey::new("h3", "s3")]
        );
        assert_eq!(index.len(), 2);

        clock.advance(11.0);
        assert_eq!(index.expire().len(), 1);
        assert!(index.expire().is_empty());
    }

    #[test]
    fn test_delete_exactly_requires_an_identical_entry() {
        let index = MemoryIndex::new(ManualClock::new(0.0));
        index.insert(ev("h", "s", 1.0).with_metric(1.0)).unwrap();

        index.delete_exactly(&ev("h", "s", 1.0).with_metric(2.0));
        assert_eq!(index.len(), 1);
        index.delete_exactly(&ev("h", "s", 1.0).with_metric(1.0));
        assert!(index.is_empty());
    }

    #[test]
    fn test_insert_replaces_and_search_filters() {
        let index = MemoryIndex::new(ManualClock::new(0.0));
        index.insert(ev("h", "cpu", 1.0)).unwrap();
        index.insert(ev("h", "cpu", 2.0)).unwrap();
        index.insert(ev("h", "mem", 2.0).with_tag("prod")).unwrap();

        assert_eq!(index.len(), 2);
        assert_eq!(index.lookup("h", "cpu").unwrap().time, Some(2.0));
        assert_eq!(index.search(&Query::tagged("prod")).len(), 1);
        assert_eq!(index.search(&Query::host("h")).len(), 2);

        index.delete(&Event::new().with_host("h").with_service("cpu"));
        assert!(index.lookup("h", "cpu").is_none());
        index.clear();
        assert!(index.snapshot().is_empty());
    }

    #[test]
    fn test_memory_indexes_are_equivalent() {
        let a = MemoryIndex::new(ManualClock::new(0.0));
        let b = MemoryIndex::new(ManualClock::new(5.0)).with_default_ttl(1.0);
        assert!(a.equivalent(&b));
        assert!(!a.conflicts(&b));
    }
}
