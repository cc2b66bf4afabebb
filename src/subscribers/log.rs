//! # LogWriter: renders signals through `tracing`
//!
//! ## Example output (fmt subscriber)
//! ```text
//! INFO corevisor: transition started to_stop=1
//! INFO corevisor: service stopped service="listener[tcp:5555]"
//! WARN corevisor: service failed service="reaper[10s]" phase=start reason="..."
//! WARN corevisor: tick failed service="discovery[30s]" failures=2 reason="..."
//! ```

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::subscribers::Subscribe;
use crate::telemetry::{Signal, SignalKind};

/// Signal writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_signal(&self, s: &Signal) {
        let service = s.service.as_deref().unwrap_or("-");
        let reason = s.reason.as_deref().unwrap_or("");
        match s.kind {
            SignalKind::TransitionStarted => info!(to_stop = s.count, "transition started"),
            SignalKind::TransitionCompleted => info!(failures = s.count, "transition completed"),
            SignalKind::ServiceStopped => info!(service, "service stopped"),
            SignalKind::ServiceReloaded => debug!(service, "service reloaded"),
            SignalKind::ServiceStarted => debug!(service, "service started"),
            SignalKind::ServiceFailed => {
                let phase = s.phase.map(|p| p.as_str()).unwrap_or("-");
                warn!(service, phase, reason, "service failed")
            }
            SignalKind::TickFailed => warn!(service, failures = s.count, reason, "tick failed"),
            SignalKind::TickTimedOut => warn!(service, timeout_ms = s.timeout_ms, "tick timed out"),
            SignalKind::BackoffScheduled => {
                debug!(service, delay_ms = s.delay_ms, failures = s.count, "backoff scheduled")
            }
            SignalKind::EntriesExpired => debug!(count = s.count, "entries expired"),
            SignalKind::ProcessingFailed => warn!(service, reason, "processing failed"),
            SignalKind::DiscoveryChanged => info!(changes = s.count, "discovery changed"),
            SignalKind::ShutdownRequested => info!("shutdown requested"),
            SignalKind::AllStoppedWithin => info!("all services stopped within grace"),
            SignalKind::GraceExceeded => warn!("grace exceeded"),
            SignalKind::SubscriberOverflow => warn!(subscriber = service, reason, "subscriber overflow"),
            SignalKind::SubscriberPanicked => warn!(subscriber = service, reason, "subscriber panicked"),
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
