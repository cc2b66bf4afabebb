//! # Core: immutable configuration snapshot.
//!
//! A [`Core`] is plain data: an ordered list of stream handlers, an unordered
//! collection of services, an optional index, an optional pub/sub registry and
//! an optional metrics sink ([`Bus`]). Cloning is cheap (every part is behind an
//! `Arc`) and a `Core` is never mutated in place: [`Core::add_service`] and
//! [`CoreBuilder`] return new values, and [`transition`](crate::transition)
//! reconciles the live services behind them.
//!
//! ## Rules
//! - Stream handlers run in registration order; a failing handler does not stop
//!   the ones after it.
//! - The index and the pub/sub registry count as services for conflicts,
//!   equivalence and lifecycle (see [`Core::all_services`]).
//! - The index is always held wrapped (see [`WrappedIndex`]) and wired to this
//!   core's pub/sub registry.

use std::fmt;
use std::sync::Arc;

use crate::core::stream::StreamFn;
use crate::error::{ConflictError, ProcessingError, panic_info};
use crate::event::Event;
use crate::index::{Index, WrappedIndex};
use crate::pubsub::PubSub;
use crate::service::{Service, ServiceRef};
use crate::telemetry::Bus;

/// Immutable snapshot of streams, services, index, pub/sub and metrics sink.
#[derive(Clone)]
pub struct Core {
    pub(crate) streams: Arc<[StreamFn]>,
    pub(crate) services: Arc<[ServiceRef]>,
    pub(crate) index: Option<Arc<WrappedIndex>>,
    pub(crate) pubsub: Option<Arc<PubSub>>,
    pub(crate) bus: Option<Bus>,
}

impl Core {
    pub fn builder() -> CoreBuilder {
        CoreBuilder::default()
    }

    pub fn streams(&self) -> &[StreamFn] {
        &self.streams
    }

    /// Services other than the index and the pub/sub registry.
    pub fn services(&self) -> &[ServiceRef] {
        &self.services
    }

    pub fn index(&self) -> Option<&Arc<WrappedIndex>> {
        self.index.as_ref()
    }

    pub fn pubsub(&self) -> Option<&Arc<PubSub>> {
        self.pubsub.as_ref()
    }

    /// Metrics sink for self-instrumentation.
    pub fn bus(&self) -> Option<&Bus> {
        self.bus.as_ref()
    }

    /// Every managed service, with the index and pub/sub as pseudo-services.
    pub fn all_services(&self) -> Vec<ServiceRef> {
        let mut all: Vec<ServiceRef> = self.services.to_vec();
        if let Some(index) = &self.index {
            all.push(Arc::clone(index) as ServiceRef);
        }
        if let Some(pubsub) = &self.pubsub {
            all.push(Arc::clone(pubsub) as ServiceRef);
        }
        all
    }

    /// Whether an equivalent service is part of this core.
    pub fn contains(&self, svc: &dyn Service) -> bool {
        self.all_services().iter().any(|s| s.equivalent(svc))
    }

    /// Returns a new core with `svc` added.
    ///
    /// - `force = false`: fails with [`ConflictError`] if `svc` conflicts with any
    ///   present service (index and pub/sub included); `self` is unchanged.
    /// - `force = true`: every conflicting service is dropped from the result
    ///   before `svc` is added.
    pub fn add_service(&self, svc: ServiceRef, force: bool) -> Result<Core, ConflictError> {
        let clash = |existing: &dyn Service| svc.conflicts(existing) || existing.conflicts(&*svc);

        if !force {
            if let Some(existing) = self.all_services().iter().find(|e| clash(e.as_ref())) {
                return Err(ConflictError {
                    service: svc.id(),
                    existing: existing.id(),
                });
            }
        }

        let mut next = self.clone();
        let mut services: Vec<ServiceRef> = self
            .services
            .iter()
            .filter(|e| !clash(e.as_ref()))
            .cloned()
            .collect();

        if next.pubsub.as_ref().is_some_and(|p| clash(&**p)) {
            next.pubsub = None;
            next.index = next
                .index
                .map(|i| Arc::new(WrappedIndex::new(i.inner(), None)));
        }
        if next.index.as_ref().is_some_and(|i| clash(&**i)) {
            next.index = None;
        }

        services.push(svc);
        next.services = services.into();
        Ok(next)
    }

    /// Dispatches `event` through every stream handler, in registration order.
    ///
    /// Every handler runs even when an earlier one fails or panics; failures are
    /// logged and the first one is returned.
    pub fn stream(&self, event: &Event) -> Result<(), ProcessingError> {
        let mut first: Option<ProcessingError> = None;

        for (position, handler) in self.streams.iter().enumerate() {
            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                handler(self, event)
            }))
            .unwrap_or_else(|panic| {
                Err(ProcessingError::Panicked {
                    info: panic_info(&*panic),
                })
            });

            if let Err(err) = outcome {
                tracing::warn!(
                    stream = position,
                    host = event.host.as_deref(),
                    service = event.service.as_deref(),
                    error = %err,
                    "stream handler failed"
                );
                first.get_or_insert(err);
            }
        }

        match first {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Default for Core {
    /// An empty core: no streams, services, index, pub/sub or metrics sink.
    fn default() -> Self {
        Self {
            streams: Arc::from(Vec::new()),
            services: Arc::from(Vec::new()),
            index: None,
            pubsub: None,
            bus: None,
        }
    }
}

impl fmt::Debug for Core {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Core")
            .field("streams", &self.streams.len())
            .field(
                "services",
                &self.services.iter().map(|s| s.id()).collect::<Vec<_>>(),
            )
            .field("index", &self.index.as_ref().map(|i| i.id()))
            .field("pubsub", &self.pubsub.is_some())
            .field("bus", &self.bus.is_some())
            .finish()
    }
}

/// Builder for [`Core`].
///
/// Services are added afterwards with [`Core::add_service`], which enforces
/// conflict rules.
#[derive(Default)]
pub struct CoreBuilder {
    streams: Vec<StreamFn>,
    index: Option<Arc<dyn Index>>,
    pubsub: Option<Arc<PubSub>>,
    bus: Option<Bus>,
}

impl CoreBuilder {
    /// Appends a stream handler.
    pub fn stream(mut self, handler: StreamFn) -> Self {
        self.streams.push(handler);
        self
    }

    /// Sets the raw (unwrapped) index.
    pub fn index(mut self, index: Arc<dyn Index>) -> Self {
        self.index = Some(index);
        self
    }

    pub fn pubsub(mut self, pubsub: Arc<PubSub>) -> Self {
        self.pubsub = Some(pubsub);
        self
    }

    pub fn bus(mut self, bus: Bus) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn build(self) -> Core {
        let index = self
            .index
            .map(|raw| Arc::new(WrappedIndex::new(raw, self.pubsub.clone())));
        Core {
            streams: self.streams.into(),
            services: Arc::from(Vec::new()),
            index,
            pubsub: self.pubsub,
            bus: self.bus,
        }
    }
}
