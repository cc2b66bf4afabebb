//! # Publish/subscribe registry.
//!
//! Channels are named by string; each subscription owns a bounded queue.
//!
//! ```text
//! publish(channel, event)
//!     ├──► [queue 1] ──► Subscription::recv()
//!     ├──► [queue 2] ──► Subscription::recv()     full   → event dropped for that subscriber
//!     └──► [queue N] ──► (receiver gone)          closed → subscription pruned
//! ```
//!
//! ## Rules
//! - `publish` never blocks and never fails: subscriber trouble stays with the
//!   subscriber.
//! - As a service, every registry is equivalent to every other. `reload`
//!   sweeps non-persistent subscriptions (they belong to the superseded
//!   configuration); persistent ones (external clients) survive. `stop`
//!   closes everything.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::core::Core;
use crate::error::ServiceError;
use crate::event::Event;
use crate::service::{Service, ServiceId};

/// Default per-subscription queue capacity.
pub const DEFAULT_QUEUE: usize = 1024;

struct Entry {
    id: u64,
    persistent: bool,
    tx: mpsc::Sender<Event>,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    channels: HashMap<String, Vec<Entry>>,
}

/// Receiving end of one subscription.
pub struct Subscription {
    id: u64,
    channel: String,
    rx: mpsc::Receiver<Event>,
}

impl Subscription {
    /// Waits for the next event; `None` once the subscription is closed.
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Event> {
        self.rx.try_recv().ok()
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Channel-keyed event fan-out.
pub struct PubSub {
    registry: Mutex<Registry>,
    queue: usize,
}

impl PubSub {
    pub fn new() -> Self {
        Self::with_queue(DEFAULT_QUEUE)
    }

    /// Creates a registry whose subscriptions buffer up to `queue` events (min 1).
    pub fn with_queue(queue: usize) -> Self {
        Self {
            registry: Mutex::new(Registry::default()),
            queue: queue.max(1),
        }
    }

    pub fn subscribe(&self, channel: impl Into<String>, persistent: bool) -> Subscription {
        let channel = channel.into();
        let (tx, rx) = mpsc::channel(self.queue);
        let mut reg = self.registry.lock();
        reg.next_id += 1;
        let id = reg.next_id;
        reg.channels.entry(channel.clone()).or_default().push(Entry {
            id,
            persistent,
            tx,
        });
        Subscription { id, channel, rx }
    }

    pub fn unsubscribe(&self, sub: &Subscription) {
        let mut reg = self.registry.lock();
        if let Some(entries) = reg.channels.get_mut(&sub.channel) {
            entries.retain(|e| e.id != sub.id);
            if entries.is_empty() {
                reg.channels.remove(&sub.channel);
            }
        }
    }

    /// Delivers `event` to every subscriber of `channel`; returns how many got it.
    pub fn publish(&self, channel: &str, event: &Event) -> usize {
        let mut reg = self.registry.lock();
        let Some(entries) = reg.channels.get_mut(channel) else {
            return 0;
        };
        let mut delivered = 0;
        entries.retain(|entry| match entry.tx.try_send(event.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::debug!(channel, subscription = entry.id, "subscriber queue full, event dropped");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
        if entries.is_empty() {
            reg.channels.remove(channel);
        }
        delivered
    }

    /// Drops every non-persistent subscription; returns how many were dropped.
    pub fn sweep(&self) -> usize {
        let mut reg = self.registry.lock();
        let mut swept = 0;
        reg.channels.retain(|_, entries| {
            let before = entries.len();
            entries.retain(|e| e.persistent);
            swept += before - entries.len();
            !entries.is_empty()
        });
        swept
    }

    pub fn subscription_count(&self) -> usize {
        self.registry.lock().channels.values().map(Vec::len).sum()
    }

    /// Closes every subscription; receivers drain what is queued, then see `None`.
    pub fn close_all(&self) {
        self.registry.lock().channels.clear();
    }
}

impl Default for PubSub {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Service for PubSub {
    fn id(&self) -> ServiceId {
        ServiceId::new("pubsub", "")
    }

    async fn reload(&self, _core: &Core) -> Result<(), ServiceError> {
        let swept = self.sweep();
        if swept > 0 {
            tracing::debug!(swept, "dropped subscriptions of the previous configuration");
        }
        Ok(())
    }

    async fn start(&self) -> Result<(), ServiceError> {
        Ok(())
    }

    async fn stop(&self) -> Result<(), ServiceError> {
        self.close_all();
        Ok(())
    }
}
