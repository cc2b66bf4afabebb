//! # Runtime signals emitted by the core, its services and periodic tasks.
//!
//! [`SignalKind`] classifies signals into:
//! - **Transition signals**: a transition began/completed
//! - **Lifecycle signals**: per-service stop/reload/start outcomes
//! - **Periodic signals**: tick failures, timeouts, backoff
//! - **Data signals**: expired entries, discovery changes, dispatch failures
//! - **Shutdown signals**: supervisor shutdown progress
//! - **Subscriber signals**: fan-out overflow and panics
//!
//! ## Ordering guarantees
//! Each signal has a globally unique sequence number (`seq`) that increases
//! monotonically. Use `seq` to restore order when delivery interleaves.
//!
//! ## Example
//! ```rust
//! use corevisor::{Phase, Signal, SignalKind};
//!
//! let sig = Signal::new(SignalKind::ServiceFailed)
//!     .with_service("listener[tcp:5555]")
//!     .with_phase(Phase::Start)
//!     .with_reason("address in use");
//!
//! assert_eq!(sig.kind, SignalKind::ServiceFailed);
//! assert_eq!(sig.phase, Some(Phase::Start));
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for signal ordering.
static SIGNAL_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    // === Transition ===
    /// A transition started.
    ///
    /// Sets:
    /// - `count`: number of services about to be stopped
    TransitionStarted,

    /// All three phases of a transition completed.
    ///
    /// Sets:
    /// - `count`: number of lifecycle failures observed
    TransitionCompleted,

    // === Service lifecycle ===
    /// A service stopped successfully.
    ServiceStopped,

    /// A service accepted the new core.
    ServiceReloaded,

    /// A service started (or confirmed it was already running).
    ServiceStarted,

    /// A lifecycle call failed or panicked.
    ///
    /// Sets:
    /// - `service`: service identity
    /// - `phase`: the failing phase
    /// - `reason`: error message
    ServiceFailed,

    // === Periodic tasks ===
    /// A tick returned an error or panicked.
    ///
    /// Sets:
    /// - `service`, `reason`, `count` (consecutive failures)
    TickFailed,

    /// A tick exceeded its timeout.
    ///
    /// Sets:
    /// - `service`, `timeout_ms`
    TickTimedOut,

    /// Next tick delayed after a failure.
    ///
    /// Sets:
    /// - `service`, `delay_ms`, `count` (consecutive failures)
    BackoffScheduled,

    // === Data ===
    /// The reaper drained expired entries.
    ///
    /// Sets:
    /// - `count`: number of entries expired this tick
    EntriesExpired,

    /// Processing one synthesized event failed.
    ///
    /// Sets:
    /// - `service`: producing service, `reason`
    ProcessingFailed,

    /// Discovery emitted membership changes.
    ///
    /// Sets:
    /// - `count`: number of added/removed events
    DiscoveryChanged,

    // === Shutdown ===
    /// Shutdown requested (OS signal observed or explicit call).
    ShutdownRequested,

    /// Every service stopped within the grace period.
    AllStoppedWithin,

    /// Grace period exceeded.
    GraceExceeded,

    // === Subscribers ===
    /// Subscriber panicked during signal processing.
    ///
    /// Sets:
    /// - `service`: subscriber name, `reason`: panic info
    SubscriberPanicked,

    /// Subscriber dropped a signal (queue full or worker closed).
    ///
    /// Sets:
    /// - `service`: subscriber name, `reason`: "full" / "closed"
    SubscriberOverflow,
}

/// Lifecycle phase of a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Stop,
    Reload,
    Start,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Stop => "stop",
            Phase::Reload => "reload",
            Phase::Start => "start",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runtime signal with optional metadata.
#[derive(Clone, Debug)]
pub struct Signal {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    pub kind: SignalKind,
    /// Identity of the service (or subscriber) involved.
    pub service: Option<Arc<str>>,
    pub phase: Option<Phase>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    pub count: Option<u32>,
    pub timeout_ms: Option<u32>,
    pub delay_ms: Option<u32>,
}

impl Signal {
    /// Creates a new signal of the given kind with current timestamp and next sequence number.
    pub fn new(kind: SignalKind) -> Self {
        Self {
            seq: SIGNAL_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            service: None,
            phase: None,
            reason: None,
            count: None,
            timeout_ms: None,
            delay_ms: None,
        }
    }

    #[inline]
    pub fn with_service(mut self, service: impl Into<Arc<str>>) -> Self {
        self.service = Some(service.into());
        self
    }

    #[inline]
    pub fn with_phase(mut self, phase: Phase) -> Self {
        self.phase = Some(phase);
        self
    }

    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    #[inline]
    pub fn with_count(mut self, n: usize) -> Self {
        self.count = Some(n.min(u32::MAX as usize) as u32);
        self
    }

    /// Attaches a timeout duration (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        self.timeout_ms = Some(d.as_millis().min(u128::from(u32::MAX)) as u32);
        self
    }

    /// Attaches a backoff delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay_ms = Some(d.as_millis().min(u128::from(u32::MAX)) as u32);
        self
    }

    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Signal::new(SignalKind::SubscriberOverflow)
            .with_service(subscriber)
            .with_reason(reason)
    }

    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Signal::new(SignalKind::SubscriberPanicked)
            .with_service(subscriber)
            .with_reason(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_numbers_increase() {
        let a = Signal::new(SignalKind::ServiceStarted);
        let b = Signal::new(SignalKind::ServiceStarted);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn test_durations_are_clamped_to_u32_millis() {
        let s = Signal::new(SignalKind::TickTimedOut)
            .with_timeout(Duration::from_secs(u64::MAX / 2))
            .with_delay(Duration::from_millis(250));
        assert_eq!(s.timeout_ms, Some(u32::MAX));
        assert_eq!(s.delay_ms, Some(250));
    }
}
