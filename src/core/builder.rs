use std::sync::Arc;

use crate::{
    config::Config,
    subscribers::{LiveTracker, Subscribe, SubscriberSet},
    telemetry::Bus,
};

use super::supervisor::Supervisor;

/// Builder for constructing a [`Supervisor`].
pub struct SupervisorBuilder {
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl SupervisorBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
        }
    }

    /// Sets signal subscribers.
    ///
    /// Subscribers receive runtime signals (transitions, lifecycle failures,
    /// tick failures, expiries) through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the supervisor and spawns its subscriber workers.
    ///
    /// Must be called from within a tokio runtime. A [`LiveTracker`] is always
    /// added to the subscribers; it names stuck services on shutdown.
    pub fn build(self) -> Arc<Supervisor> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let live = Arc::new(LiveTracker::new());

        let mut subscribers = self.subscribers;
        subscribers.push(live.clone());
        let subs = Arc::new(SubscriberSet::new(subscribers, bus.clone()));

        let sup = Arc::new(Supervisor::new_internal(self.cfg, bus, subs, live));
        sup.subscriber_listener();
        sup
    }
}
