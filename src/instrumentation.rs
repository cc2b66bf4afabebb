//! # Self-instrumentation sampler.
//!
//! A periodic service that samples the live core and streams the figures as
//! ordinary events, so the engine monitors itself with its own pipeline.
//!
//! | service                         | metric                         |
//! |---------------------------------|--------------------------------|
//! | `corevisor index size`          | entries in the index           |
//! | `corevisor services`            | managed services (all)         |
//! | `corevisor streams`             | registered stream handlers     |
//! | `corevisor pubsub subscriptions`| open pub/sub subscriptions     |

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::clock::ClockRef;
use crate::core::{Core, isolate};
use crate::error::TickError;
use crate::event::Event;
use crate::index::Index;
use crate::service::{PeriodicService, Tick};

/// Sampler settings.
#[derive(Clone, Debug)]
pub struct InstrumentationConfig {
    pub interval: Duration,
    /// Host written on sampled events.
    pub host: String,
    /// Tags added to sampled events.
    pub tags: Vec<String>,
}

impl Default for InstrumentationConfig {
    /// `interval = 10s`, `host = "localhost"`, tag `internal`.
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            host: "localhost".to_string(),
            tags: vec!["internal".to_string()],
        }
    }
}

/// Samples core figures into events.
pub struct Sampler {
    cfg: InstrumentationConfig,
    clock: ClockRef,
}

impl Sampler {
    pub fn new(cfg: InstrumentationConfig, clock: ClockRef) -> Self {
        Self { cfg, clock }
    }

    pub fn sample(&self, core: &Core) -> Vec<Event> {
        let now = self.clock.now();
        let ttl = 2.0 * self.cfg.interval.as_secs_f64();

        let mut figures = vec![
            ("corevisor services", core.all_services().len()),
            ("corevisor streams", core.streams().len()),
        ];
        if let Some(index) = core.index() {
            figures.push(("corevisor index size", index.len()));
        }
        if let Some(pubsub) = core.pubsub() {
            figures.push(("corevisor pubsub subscriptions", pubsub.subscription_count()));
        }

        figures
            .into_iter()
            .map(|(service, value)| {
                let mut event = Event::new()
                    .with_host(self.cfg.host.as_str())
                    .with_service(service)
                    .with_state("ok")
                    .with_metric(value as f64)
                    .with_time(now)
                    .with_ttl(ttl);
                event.tags = self.cfg.tags.clone();
                event
            })
            .collect()
    }
}

#[async_trait]
impl Tick for Sampler {
    async fn tick(&self, core: &Core, ctx: CancellationToken) -> Result<(), TickError> {
        if ctx.is_cancelled() {
            return Err(TickError::Canceled);
        }
        for event in self.sample(core) {
            isolate(core, "instrumentation", || core.stream(&event));
        }
        Ok(())
    }
}

/// Builds the instrumentation service.
pub fn instrumentation(cfg: InstrumentationConfig, clock: ClockRef) -> PeriodicService {
    let key = format!("{}ms:{}", cfg.interval.as_millis(), cfg.host);
    let interval = cfg.interval;
    PeriodicService::new(
        "instrumentation",
        key,
        interval,
        Arc::new(Sampler::new(cfg, clock)),
    )
}
