//! # PeriodicService: timer-driven service.
//!
//! Runs a [`Tick`] once per `interval` on its own tokio task, against the core
//! it was last reloaded with.
//!
//! ## Loop
//! ```text
//! start() ──► spawn run_loop(cancel)
//!
//! loop {
//!   ├─► wait next interval tick (cancellable)
//!   ├─► core = latest reloaded core (skip tick if none)
//!   ├─► run_tick(): child token, optional timeout, panic isolation
//!   │       ├─ Ok            ─► failures = 0
//!   │       ├─ Canceled      ─► exit
//!   │       └─ Err/Timeout   ─► publish TickFailed (+TickTimedOut)
//!   │                           publish BackoffScheduled
//!   │                           sleep(backoff.next(failures)) (cancellable)
//!   │                           reset interval
//! }
//!
//! stop() ──► cancel ──► join ──► drop core reference
//! ```
//!
//! ## Rules
//! - Ticks run **sequentially**; a tick still running when the next one is due
//!   makes the scheduler **skip** the missed tick (`MissedTickBehavior::Skip`).
//! - The first tick fires one full interval after `start`.
//! - A panicking, failing or timed-out tick never ends the loop.
//! - `start` while running is a no-op; `stop` while stopped is a no-op.
//! - `stop` waits for the loop to exit; an in-flight tick is dropped if it
//!   ignores cancellation.
//! - Services sharing a kind conflict with each other, so a forced add of a
//!   reconfigured instance replaces the previous one.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::core::Core;
use crate::error::{ServiceError, TickError, panic_info};
use crate::policies::BackoffPolicy;
use crate::service::{Service, ServiceId, TickRef};
use crate::telemetry::{Signal, SignalKind};

const MIN_INTERVAL: Duration = Duration::from_millis(1);

struct Runner {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

/// Parameters of one scheduler loop.
#[derive(Clone)]
struct Schedule {
    name: Arc<str>,
    interval: Duration,
    timeout: Option<Duration>,
    backoff: BackoffPolicy,
}

/// Service that runs a [`Tick`](crate::Tick) every `interval`.
pub struct PeriodicService {
    id: ServiceId,
    schedule: Schedule,
    tick: TickRef,
    core: Arc<RwLock<Option<Core>>>,
    runner: Mutex<Option<Runner>>,
}

impl PeriodicService {
    /// Creates a periodic service.
    ///
    /// `kind` names the service (and drives conflicts); `key` encodes its
    /// configuration (and drives equivalence).
    pub fn new(
        kind: impl Into<std::borrow::Cow<'static, str>>,
        key: impl Into<String>,
        interval: Duration,
        tick: TickRef,
    ) -> Self {
        let id = ServiceId::new(kind, key);
        Self {
            schedule: Schedule {
                name: Arc::from(id.to_string()),
                interval: interval.max(MIN_INTERVAL),
                timeout: None,
                backoff: BackoffPolicy::default(),
            },
            id,
            tick,
            core: Arc::new(RwLock::new(None)),
            runner: Mutex::new(None),
        }
    }

    /// Applies the tick defaults from the global config.
    pub fn with_defaults(self, cfg: &Config) -> Self {
        self.with_timeout(cfg.default_tick_timeout())
            .with_backoff(cfg.tick_backoff)
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.schedule.timeout = timeout.filter(|d| !d.is_zero());
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.schedule.backoff = backoff;
        self
    }

    pub fn interval(&self) -> Duration {
        self.schedule.interval
    }

    /// Returns `true` while the scheduler loop is alive.
    pub fn is_running(&self) -> bool {
        self.runner
            .lock()
            .as_ref()
            .is_some_and(|r| !r.join.is_finished())
    }
}

#[async_trait]
impl Service for PeriodicService {
    fn id(&self) -> ServiceId {
        self.id.clone()
    }

    fn conflicts(&self, other: &dyn Service) -> bool {
        other.id().kind() == self.id.kind()
    }

    async fn reload(&self, core: &Core) -> Result<(), ServiceError> {
        *self.core.write() = Some(core.clone());
        Ok(())
    }

    async fn start(&self) -> Result<(), ServiceError> {
        let mut runner = self.runner.lock();
        if runner.as_ref().is_some_and(|r| !r.join.is_finished()) {
            return Ok(());
        }
        let cancel = CancellationToken::new();
        let join = tokio::spawn(run_loop(
            self.schedule.clone(),
            Arc::clone(&self.tick),
            Arc::clone(&self.core),
            cancel.clone(),
        ));
        *runner = Some(Runner { cancel, join });
        Ok(())
    }

    async fn stop(&self) -> Result<(), ServiceError> {
        let taken = self.runner.lock().take();
        let result = match taken {
            Some(runner) => {
                runner.cancel.cancel();
                runner
                    .join
                    .await
                    .map_err(|e| ServiceError::fail(format!("scheduler loop ended abnormally: {e}")))
            }
            None => Ok(()),
        };
        // Breaks the core → service → core reference cycle.
        *self.core.write() = None;
        result
    }
}

async fn run_loop(
    schedule: Schedule,
    tick: TickRef,
    core: Arc<RwLock<Option<Core>>>,
    cancel: CancellationToken,
) {
    let mut ticker = time::interval_at(Instant::now() + schedule.interval, schedule.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut failures: u32 = 0;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        let Some(current) = core.read().clone() else {
            continue;
        };

        match run_tick(&schedule, tick.as_ref(), &current, &cancel).await {
            Ok(()) => failures = 0,
            Err(TickError::Canceled) => break,
            Err(err) => {
                failures = failures.saturating_add(1);
                tracing::warn!(
                    service = &*schedule.name,
                    failures,
                    error = %err,
                    "tick failed"
                );
                let delay = schedule.backoff.next(failures - 1);
                if let Some(bus) = current.bus() {
                    bus.publish(
                        Signal::new(SignalKind::TickFailed)
                            .with_service(Arc::clone(&schedule.name))
                            .with_reason(err.to_string())
                            .with_count(failures as usize),
                    );
                    bus.publish(
                        Signal::new(SignalKind::BackoffScheduled)
                            .with_service(Arc::clone(&schedule.name))
                            .with_delay(delay)
                            .with_count(failures as usize),
                    );
                }
                drop(current);

                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = time::sleep(delay) => {}
                }
                ticker.reset();
            }
        }
    }
}

/// Executes one tick with optional timeout, cancellation and panic isolation.
async fn run_tick(
    schedule: &Schedule,
    tick: &dyn crate::service::Tick,
    core: &Core,
    cancel: &CancellationToken,
) -> Result<(), TickError> {
    let child = cancel.child_token();
    let fut = std::panic::AssertUnwindSafe(tick.tick(core, child.clone())).catch_unwind();

    let guarded = async {
        match schedule.timeout {
            Some(dur) => match time::timeout(dur, fut).await {
                Ok(r) => r,
                Err(_elapsed) => {
                    child.cancel();
                    if let Some(bus) = core.bus() {
                        bus.publish(
                            Signal::new(SignalKind::TickTimedOut)
                                .with_service(Arc::clone(&schedule.name))
                                .with_timeout(dur),
                        );
                    }
                    Ok(Err(TickError::Timeout { timeout: dur }))
                }
            },
            None => fut.await,
        }
    };

    tokio::select! {
        _ = cancel.cancelled() => Err(TickError::Canceled),
        res = guarded => match res {
            Ok(r) => r,
            Err(panic) => Err(TickError::Panicked { info: panic_info(&*panic) }),
        },
    }
}
