//! # Global runtime configuration.
//!
//! Provides [`Config`], the supervisor settings plus the defaults periodic
//! services inherit when they are not configured explicitly.
//!
//! Per-component settings live next to their component:
//! [`ReaperConfig`](crate::ReaperConfig),
//! [`DiscoveryConfig`](crate::DiscoveryConfig),
//! [`InstrumentationConfig`](crate::InstrumentationConfig).
//!
//! ## Sentinel values
//! - `tick_timeout = 0s` → ticks run without a timeout

use std::time::Duration;

use crate::policies::BackoffPolicy;

/// Global configuration for the supervisor runtime.
///
/// ## Field semantics
/// - `grace`: maximum wait for every service to stop on shutdown
/// - `bus_capacity`: signal bus ring buffer size (min 1; clamped by Bus)
/// - `tick_timeout`: default per-tick timeout for periodic services (`0s` = none)
/// - `tick_backoff`: default delay policy after failed ticks
#[derive(Clone, Debug)]
pub struct Config {
    /// Maximum time to wait for the final transition on shutdown.
    ///
    /// If exceeded, `Supervisor::shutdown` returns `RuntimeError::GraceExceeded`
    /// naming the services still live.
    pub grace: Duration,

    /// Capacity of the signal bus broadcast channel.
    pub bus_capacity: usize,

    /// Default tick timeout.
    pub tick_timeout: Duration,

    /// Default backoff after failed ticks.
    pub tick_backoff: BackoffPolicy,
}

impl Config {
    /// Returns the default tick timeout as an `Option` (`None` = no timeout).
    #[inline]
    pub fn default_tick_timeout(&self) -> Option<Duration> {
        if self.tick_timeout == Duration::ZERO {
            None
        } else {
            Some(self.tick_timeout)
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `grace = 30s`
    /// - `bus_capacity = 1024`
    /// - `tick_timeout = 0s` (no timeout)
    /// - `tick_backoff = BackoffPolicy::default()`
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(30),
            bus_capacity: 1024,
            tick_timeout: Duration::ZERO,
            tick_backoff: BackoffPolicy::default(),
        }
    }
}
