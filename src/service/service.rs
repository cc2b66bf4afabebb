//! # The service lifecycle capability.
//!
//! Every long-lived component held by a [`Core`] implements [`Service`]:
//!
//! ```text
//! equivalent(other) ── same logical identity/config? keep the live instance
//! conflicts(other)  ── can the two coexist in one core?
//! reload(core)      ── receive the merged core (always before start)
//! start()           ── begin work; no-op when already running
//! stop()            ── release timers/tasks/sockets before returning
//! ```
//!
//! Equivalence defaults to comparing [`ServiceId`]s, so a service only has to
//! describe *what it is*; the transition decides whether the live instance
//! survives a reload.
//!
//! # Example
//! ```
//! use async_trait::async_trait;
//! use corevisor::{Service, ServiceError, ServiceId};
//!
//! struct Listener { port: u16 }
//!
//! #[async_trait]
//! impl Service for Listener {
//!     fn id(&self) -> ServiceId { ServiceId::new("tcp-listener", self.port.to_string()) }
//!
//!     fn conflicts(&self, other: &dyn Service) -> bool {
//!         other.id().kind() == "tcp-listener" && other.id().key() == self.port.to_string()
//!     }
//!
//!     async fn start(&self) -> Result<(), ServiceError> { Ok(()) }
//!     async fn stop(&self) -> Result<(), ServiceError> { Ok(()) }
//! }
//! ```

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::core::Core;
use crate::error::ServiceError;

/// Identity of a service: a kind plus a configuration key.
///
/// Two services with equal ids are equivalent by default.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceId {
    kind: Cow<'static, str>,
    key: String,
}

impl ServiceId {
    pub fn new(kind: impl Into<Cow<'static, str>>, key: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            key: key.into(),
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.key.is_empty() {
            f.write_str(&self.kind)
        } else {
            write!(f, "{}[{}]", self.kind, self.key)
        }
    }
}

/// Lifecycle capability of a managed component.
#[async_trait]
pub trait Service: Send + Sync + 'static {
    /// Stable identity of this service.
    fn id(&self) -> ServiceId;

    /// Whether `other` describes the same logical component.
    fn equivalent(&self, other: &dyn Service) -> bool {
        self.id() == other.id()
    }

    /// Whether `other` cannot coexist with this service.
    fn conflicts(&self, other: &dyn Service) -> bool {
        let _ = other;
        false
    }

    /// Hands the service the merged core. Called before every `start`.
    async fn reload(&self, core: &Core) -> Result<(), ServiceError> {
        let _ = core;
        Ok(())
    }

    async fn start(&self) -> Result<(), ServiceError>;

    async fn stop(&self) -> Result<(), ServiceError>;
}

/// Shared service handle.
pub type ServiceRef = Arc<dyn Service>;
