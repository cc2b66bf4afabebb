//! # LiveTracker – track currently started services
//!
//! Maintains the set of **live** service identities by listening to
//! [`SignalKind::ServiceStarted`] and [`SignalKind::ServiceStopped`].
//!
//! The supervisor reads it during shutdown to name services that did not stop
//! within the grace period.
//!
//! ## Behavior
//! - Duplicate **start** → tolerated (a kept service is started on every transition).
//! - **Stop** without prior start → tolerated, logged at debug.

use std::collections::HashSet;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::subscribers::Subscribe;
use crate::telemetry::{Signal, SignalKind};

/// Tracks the set of currently started services.
pub struct LiveTracker {
    inner: RwLock<HashSet<String>>,
    capacity: usize,
}

impl LiveTracker {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashSet::new()),
            capacity: 2048,
        }
    }

    /// Configure the queue capacity for this subscriber.
    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Returns a sorted snapshot of live service identities.
    #[must_use]
    pub fn snapshot(&self) -> Vec<String> {
        let mut v: Vec<String> = self.inner.read().iter().cloned().collect();
        v.sort_unstable();
        v
    }

    pub fn is_live(&self, service: &str) -> bool {
        self.inner.read().contains(service)
    }
}

#[async_trait]
impl Subscribe for LiveTracker {
    async fn on_signal(&self, signal: &Signal) {
        let Some(name) = signal.service.as_deref() else {
            return;
        };
        match signal.kind {
            SignalKind::ServiceStarted => {
                self.inner.write().insert(name.to_owned());
            }
            SignalKind::ServiceStopped => {
                if !self.inner.write().remove(name) {
                    tracing::debug!(service = name, "stop without start");
                }
            }
            _ => {}
        }
    }

    fn name(&self) -> &'static str {
        "LiveTracker"
    }

    fn queue_capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for LiveTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_tracks_start_and_stop() {
        let t = LiveTracker::new();
        t.on_signal(&Signal::new(SignalKind::ServiceStarted).with_service("b"))
            .await;
        t.on_signal(&Signal::new(SignalKind::ServiceStarted).with_service("a"))
            .await;
        t.on_signal(&Signal::new(SignalKind::ServiceStarted).with_service("a"))
            .await;
        assert_eq!(t.snapshot(), vec!["a".to_string(), "b".to_string()]);

        t.on_signal(&Signal::new(SignalKind::ServiceStopped).with_service("a"))
            .await;
        t.on_signal(&Signal::new(SignalKind::ServiceStopped).with_service("zzz"))
            .await;
        assert!(!t.is_live("a"));
        assert!(t.is_live("b"));
    }
}
