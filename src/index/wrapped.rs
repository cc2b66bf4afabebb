//! # Index decorator: timestamp validation and pub/sub fan-out.
//!
//! ```text
//! insert(event)
//!   ├─ event.time missing ─► Err(ValidationError::MissingTime)   (nothing stored, nothing published)
//!   ├─► inner.insert(event)
//!   └─► pubsub.publish("index", event)                            (best-effort, if attached)
//! ```
//!
//! Every other operation, and the whole [`Service`] lifecycle, is forwarded to
//! the wrapped index, so a transition treats the decorator exactly like the
//! index it wraps.

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::Core;
use crate::error::{ServiceError, ValidationError};
use crate::event::{Event, Query};
use crate::index::Index;
use crate::pubsub::PubSub;
use crate::service::{Service, ServiceId};

/// Pub/sub channel carrying every accepted insert and every expiry.
pub const INDEX_CHANNEL: &str = "index";

/// [`Index`] decorator used by every [`Core`].
pub struct WrappedIndex {
    inner: Arc<dyn Index>,
    pubsub: Option<Arc<PubSub>>,
}

impl WrappedIndex {
    pub fn new(inner: Arc<dyn Index>, pubsub: Option<Arc<PubSub>>) -> Self {
        Self { inner, pubsub }
    }

    /// The wrapped (raw) index.
    pub fn inner(&self) -> Arc<dyn Index> {
        Arc::clone(&self.inner)
    }

    pub fn pubsub(&self) -> Option<&Arc<PubSub>> {
        self.pubsub.as_ref()
    }
}

impl Index for WrappedIndex {
    fn clear(&self) {
        self.inner.clear();
    }

    fn delete(&self, event: &Event) {
        self.inner.delete(event);
    }

    fn delete_exactly(&self, event: &Event) {
        self.inner.delete_exactly(event);
    }

    fn expire(&self) -> Vec<Event> {
        self.inner.expire()
    }

    fn search(&self, query: &Query) -> Vec<Event> {
        self.inner.search(query)
    }

    fn lookup(&self, host: &str, service: &str) -> Option<Event> {
        self.inner.lookup(host, service)
    }

    fn insert(&self, event: Event) -> Result<(), ValidationError> {
        if event.time.is_none() {
            return Err(ValidationError::MissingTime {
                host: event.host,
                service: event.service,
            });
        }
        match &self.pubsub {
            Some(pubsub) => {
                self.inner.insert(event.clone())?;
                pubsub.publish(INDEX_CHANNEL, &event);
                Ok(())
            }
            None => self.inner.insert(event),
        }
    }

    fn snapshot(&self) -> Vec<Event> {
        self.inner.snapshot()
    }

    fn len(&self) -> usize {
        self.inner.len()
    }
}

#[async_trait]
impl Service for WrappedIndex {
    fn id(&self) -> ServiceId {
        self.inner.id()
    }

    fn equivalent(&self, other: &dyn Service) -> bool {
        self.inner.equivalent(other)
    }

    fn conflicts(&self, other: &dyn Service) -> bool {
        self.inner.conflicts(other)
    }

    async fn reload(&self, core: &Core) -> Result<(), ServiceError> {
        self.inner.reload(core).await
    }

    async fn start(&self) -> Result<(), ServiceError> {
        self.inner.start().await
    }

    async fn stop(&self) -> Result<(), ServiceError> {
        self.inner.stop().await
    }
}
