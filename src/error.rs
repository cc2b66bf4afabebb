//! Error types used by the corevisor runtime, its services and periodic tasks.
//!
//! Structural errors are returned synchronously to whoever triggered the mutation:
//!
//! - [`ValidationError`]: an event was rejected by the index (e.g. no timestamp).
//! - [`ConflictError`]: a service cannot coexist with one already in the core.
//!
//! Runtime errors are isolated and logged, never allowed to abort their siblings:
//!
//! - [`ServiceError`]: a service's `stop`/`reload`/`start` call failed or panicked.
//! - [`TickError`]: one tick of a periodic service failed, timed out or panicked.
//! - [`ProcessingError`]: a stream handler failed while dispatching an event.
//! - [`DiscoveryError`]: the discovery inventory could not be fetched.
//! - [`RuntimeError`]: the supervisor could not shut down within its grace period.
//!
//! Every enum provides `as_label` (stable snake_case label for logs/metrics).

use std::time::Duration;
use thiserror::Error;

use crate::service::ServiceId;

/// # Errors produced by the corevisor runtime.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Shutdown grace period was exceeded; some services were still live.
    #[error("shutdown timeout {grace:?} exceeded; still live: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Services that had not reported a stop in time.
        stuck: Vec<String>,
    },

    /// The shutdown transition task panicked or was cancelled.
    #[error("shutdown aborted: {reason}")]
    ShutdownAborted { reason: String },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use corevisor::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
            RuntimeError::ShutdownAborted { .. } => "runtime_shutdown_aborted",
        }
    }
}

/// # Event rejected by the index.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// The event carries no `time`; the index cannot compute its expiry.
    #[error("event has no time (host={host:?}, service={service:?})")]
    MissingTime {
        host: Option<String>,
        service: Option<String>,
    },
}

impl ValidationError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ValidationError::MissingTime { .. } => "validation_missing_time",
        }
    }
}

/// # Two services that cannot coexist in one core.
///
/// Returned by a non-forced [`Core::add_service`](crate::Core::add_service);
/// the core the call was made on is left unchanged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("service {service} conflicts with existing service {existing}")]
pub struct ConflictError {
    /// Identity of the service being added.
    pub service: ServiceId,
    /// Identity of the service already present.
    pub existing: ServiceId,
}

impl ConflictError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        "service_conflict"
    }
}

/// # Errors produced by service lifecycle calls.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum ServiceError {
    /// The lifecycle call failed.
    #[error("service call failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// The lifecycle call panicked; the panic was caught by the runtime.
    #[error("service call panicked: {info}")]
    Panicked {
        /// Panic payload rendered as text.
        info: String,
    },
}

impl ServiceError {
    /// Shorthand for [`ServiceError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        ServiceError::Fail {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ServiceError::Fail { .. } => "service_failed",
            ServiceError::Panicked { .. } => "service_panicked",
        }
    }
}

/// # Errors produced by one tick of a periodic service.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TickError {
    /// Tick exceeded its timeout duration.
    #[error("tick timed out after {timeout:?}")]
    Timeout {
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    /// Tick failed; the next tick is delayed by the service backoff.
    #[error("tick failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Tick panicked; the panic was caught by the scheduler loop.
    #[error("tick panicked: {info}")]
    Panicked { info: String },

    /// Tick was cancelled because the service is stopping.
    #[error("tick cancelled")]
    Canceled,
}

impl TickError {
    /// Shorthand for [`TickError::Fail`].
    pub fn fail(error: impl ToString) -> Self {
        TickError::Fail {
            error: error.to_string(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use corevisor::TickError;
    /// use std::time::Duration;
    ///
    /// let err = TickError::Timeout { timeout: Duration::from_secs(1) };
    /// assert_eq!(err.as_label(), "tick_timeout");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TickError::Timeout { .. } => "tick_timeout",
            TickError::Fail { .. } => "tick_failed",
            TickError::Panicked { .. } => "tick_panicked",
            TickError::Canceled => "tick_canceled",
        }
    }
}

/// # Errors raised while dispatching an event through the stream handlers.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ProcessingError {
    /// The index rejected the event.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A stream handler reported a failure.
    #[error("stream handler failed: {error}")]
    Stream { error: String },

    /// A stream handler panicked.
    #[error("stream handler panicked: {info}")]
    Panicked { info: String },
}

impl ProcessingError {
    /// Shorthand for [`ProcessingError::Stream`].
    pub fn stream(error: impl ToString) -> Self {
        ProcessingError::Stream {
            error: error.to_string(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ProcessingError::Validation(_) => "processing_validation",
            ProcessingError::Stream { .. } => "processing_stream_failed",
            ProcessingError::Panicked { .. } => "processing_panicked",
        }
    }
}

/// # Errors produced by a discovery inventory source.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// The inventory could not be fetched this cycle.
    #[error("inventory unavailable: {error}")]
    Unavailable { error: String },
}

impl DiscoveryError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            DiscoveryError::Unavailable { .. } => "discovery_unavailable",
        }
    }
}

/// Renders a caught panic payload as text.
pub(crate) fn panic_info(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_are_stable() {
        assert_eq!(ServiceError::fail("x").as_label(), "service_failed");
        assert_eq!(TickError::Canceled.as_label(), "tick_canceled");
        assert_eq!(
            ProcessingError::from(ValidationError::MissingTime {
                host: None,
                service: None
            })
            .as_label(),
            "processing_validation"
        );
    }

    #[test]
    fn test_panic_info_renders_str_and_string() {
        let a: Box<dyn std::any::Any + Send> = Box::new("boom");
        let b: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        let c: Box<dyn std::any::Any + Send> = Box::new(7_u8);
        assert_eq!(panic_info(a.as_ref()), "boom");
        assert_eq!(panic_info(b.as_ref()), "bang");
        assert_eq!(panic_info(c.as_ref()), "unknown panic");
    }
}
