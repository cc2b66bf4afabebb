//! Test doubles shared by unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::core::Core;
use crate::error::ServiceError;
use crate::service::{Service, ServiceId};
use crate::telemetry::Phase;

/// Ordered record of lifecycle calls, as `"<phase>:<label>"`.
pub(crate) type Journal = Arc<Mutex<Vec<String>>>;

type ConflictFn = Arc<dyn Fn(&ServiceId) -> bool + Send + Sync>;

/// Service that records its lifecycle calls and fails on demand.
pub(crate) struct Probe {
    id: ServiceId,
    label: String,
    conflict: Option<ConflictFn>,
    fail_on: Option<Phase>,
    panic_on: Option<Phase>,
    stop_delay: Duration,
    journal: Journal,
    own: Journal,
    reloaded_with: Mutex<Vec<ServiceId>>,
    running: AtomicBool,
}

impl Probe {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            id: ServiceId::new("probe", name.to_string()),
            label: name.to_string(),
            conflict: None,
            fail_on: None,
            panic_on: None,
            stop_delay: Duration::ZERO,
            journal: Journal::default(),
            own: Journal::default(),
            reloaded_with: Mutex::new(Vec::new()),
            running: AtomicBool::new(false),
        }
    }

    pub(crate) fn plain(name: &str) -> Arc<Self> {
        Self::new(name).arc()
    }

    /// Service bound to a port: conflicts with any other listener on it.
    pub(crate) fn listener(name: &str, port: u16) -> Arc<Self> {
        let mut probe = Self::new(name);
        probe.id = ServiceId::new("listener", format!("{name}@{port}"));
        let suffix = format!("@{port}");
        probe.conflict = Some(Arc::new(move |other: &ServiceId| {
            other.kind() == "listener" && other.key().ends_with(&suffix)
        }));
        probe.arc()
    }

    /// Service that conflicts with every service of `kind`.
    pub(crate) fn conflicting_with(kind: &'static str) -> Arc<Self> {
        let mut probe = Self::new("hostile");
        probe.conflict = Some(Arc::new(move |other: &ServiceId| other.kind() == kind));
        probe.arc()
    }

    pub(crate) fn label(mut self, label: &str) -> Self {
        self.label = label.to_string();
        self
    }

    pub(crate) fn journal(mut self, journal: &Journal) -> Self {
        self.journal = Arc::clone(journal);
        self
    }

    pub(crate) fn failing(mut self, phase: Phase) -> Self {
        self.fail_on = Some(phase);
        self
    }

    pub(crate) fn panicking(mut self, phase: Phase) -> Self {
        self.panic_on = Some(phase);
        self
    }

    pub(crate) fn slow_stop(mut self, delay: Duration) -> Self {
        self.stop_delay = delay;
        self
    }

    pub(crate) fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Calls made on this instance only.
    pub(crate) fn calls(&self) -> Vec<String> {
        self.own.lock().clone()
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Service ids of the core last passed to `reload`.
    pub(crate) fn reloaded_with(&self) -> Vec<ServiceId> {
        self.reloaded_with.lock().clone()
    }

    fn record(&self, phase: Phase) -> Result<(), ServiceError> {
        let entry = format!("{}:{}", phase, self.label);
        self.journal.lock().push(entry.clone());
        self.own.lock().push(entry);
        if self.panic_on == Some(phase) {
            panic!("{} panicked in {}", self.label, phase);
        }
        if self.fail_on == Some(phase) {
            return Err(ServiceError::fail(format!("{} refused to {}", self.label, phase)));
        }
        Ok(())
    }
}

#[async_trait]
impl Service for Probe {
    fn id(&self) -> ServiceId {
        self.id.clone()
    }

    fn conflicts(&self, other: &dyn Service) -> bool {
        self.conflict.as_ref().is_some_and(|f| f(&other.id()))
    }

    async fn reload(&self, core: &Core) -> Result<(), ServiceError> {
        *self.reloaded_with.lock() = core.services().iter().map(|s| s.id()).collect();
        self.record(Phase::Reload)
    }

    async fn start(&self) -> Result<(), ServiceError> {
        self.record(Phase::Start)?;
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) -> Result<(), ServiceError> {
        self.record(Phase::Stop)?;
        if !self.stop_delay.is_zero() {
            tokio::time::sleep(self.stop_delay).await;
        }
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }
}
