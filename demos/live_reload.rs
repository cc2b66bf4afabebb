//! # Demo: live_reload
//!
//! Reload the whole configuration while the core keeps its index.
//!
//! Demonstrates how to:
//! - Bootstrap a core with an index, a pub/sub registry, a reaper and discovery.
//! - Feed events through `Supervisor::stream` and watch the `"index"` channel.
//! - Transition to a reconfigured core: the index and registry survive, the
//!   reaper is replaced, discovery is stopped.
//! - Shut down within the grace period.
//!
//! ## Flow
//! ```text
//! main()
//!   ├─► SupervisorBuilder::build()
//!   ├─► bootstrap(core v1)        reload + start: index, pubsub, reaper(1s), discovery(1s)
//!   ├─► stream(events)            index insert ─► "index" channel ─► watcher
//!   ├─► transition_to(core v2)    stop: reaper(1s), discovery   start: reaper(2s)
//!   └─► shutdown()
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example live_reload
//! ```

use std::{sync::Arc, time::Duration};

use corevisor::{
    Clock, Config, Core, DiscoveryConfig, Event, Index, MemoryIndex, PubSub, ReaperConfig,
    ServiceDescriptor, StaticInventory, SupervisorBuilder, SystemClock, discovery,
    discovery_filter, index_stream, reaper,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1) Supervisor with a short grace period
    let cfg = Config {
        grace: Duration::from_secs(5),
        ..Config::default()
    };
    let sup = SupervisorBuilder::new(cfg.clone()).build();
    let clock = SystemClock::arc();

    // 2) Watch everything the index accepts or expires
    let pubsub = Arc::new(PubSub::new());
    let mut watcher = pubsub.subscribe("index", true);
    tokio::spawn(async move {
        while let Some(ev) = watcher.recv().await {
            println!(
                "[index] {}/{} state={}",
                ev.host.as_deref().unwrap_or("-"),
                ev.service.as_deref().unwrap_or("-"),
                ev.state.as_deref().unwrap_or("-"),
            );
        }
    });

    // 3) First configuration
    let inventory = Arc::new(StaticInventory::new(vec![ServiceDescriptor {
        hosts: vec!["db-1".into(), "db-2".into()],
        ttl: 5.0,
        service: "postgres".into(),
    }]));
    let v1 = Core::builder()
        .index(Arc::new(MemoryIndex::new(clock.clone())))
        .pubsub(pubsub.clone())
        .stream(index_stream())
        .stream(discovery_filter())
        .build()
        .add_service(
            Arc::new(reaper(
                ReaperConfig {
                    interval: Duration::from_secs(1),
                    ..ReaperConfig::default()
                },
                clock.clone(),
            )
            .with_defaults(&cfg)),
            false,
        )?
        .add_service(
            Arc::new(discovery(
                DiscoveryConfig {
                    interval: Duration::from_secs(1),
                    ..DiscoveryConfig::default()
                },
                inventory,
                clock.clone(),
            )),
            false,
        )?;

    let report = sup.bootstrap(v1).await;
    println!("[demo] bootstrapped, failures={}", report.failures.len());

    // 4) Events with a short ttl so the reaper has work to do
    for service in ["cpu", "memory"] {
        sup.stream(
            &Event::new()
                .with_host("web-1")
                .with_service(service)
                .with_metric(0.5)
                .with_time(clock.now())
                .with_ttl(1.0),
        )?;
    }
    tokio::time::sleep(Duration::from_secs(3)).await;

    // 5) Reconfigure: slower reaper, no discovery; the index is declared again
    let v2 = Core::builder()
        .index(Arc::new(MemoryIndex::new(clock.clone())))
        .pubsub(Arc::new(PubSub::new()))
        .stream(index_stream())
        .build()
        .add_service(
            Arc::new(reaper(
                ReaperConfig {
                    interval: Duration::from_secs(2),
                    ..ReaperConfig::default()
                },
                clock.clone(),
            )),
            false,
        )?;
    let report = sup.transition_to(v2).await;
    println!("[demo] reloaded, stopped={:?}", report.stopped);
    println!(
        "[demo] index kept {} entries across the reload",
        sup.current().index().map(|i| i.len()).unwrap_or(0)
    );

    // 6) Graceful shutdown
    sup.shutdown().await?;
    println!("[demo] shut down");
    Ok(())
}
