//! # Non-blocking signal fan-out to multiple subscribers.
//!
//! ```text
//! emit(signal)
//!     │
//!     ├──► [queue 1] ──► worker 1 ──► subscriber1.on_signal()
//!     │    (bounded)         └──────► panic → SubscriberPanicked
//!     ├──► [queue 2] ──► worker 2 ──► subscriber2.on_signal()
//!     └──► [queue N] ──► worker N ──► subscriberN.on_signal()
//! ```
//!
//! ## Rules
//! - **No cross-subscriber ordering**: subscriber A may process signal N while B processes N+5
//! - **Overflow**: signal dropped for that subscriber only, `SubscriberOverflow` published
//! - **Non-blocking**: `emit()` returns immediately (uses `try_send`)
//! - **Isolation**: a slow or panicking subscriber doesn't affect others
//! - **Per-subscriber FIFO**

use std::sync::Arc;

use futures::FutureExt;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::error::panic_info;
use crate::subscribers::Subscribe;
use crate::telemetry::{Bus, Signal, SignalKind};

struct SubscriberChannel {
    name: &'static str,
    sender: mpsc::Sender<Arc<Signal>>,
}

/// Fan-out coordinator for multiple signal subscribers.
pub struct SubscriberSet {
    channels: Vec<SubscriberChannel>,
    workers: Vec<JoinHandle<()>>,
    bus: Bus,
}

impl SubscriberSet {
    /// Creates a new set and spawns one worker task per subscriber.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>, bus: Bus) -> Self {
        let mut channels = Vec::with_capacity(subs.len());
        let mut workers = Vec::with_capacity(subs.len());

        for sub in subs {
            let cap = sub.queue_capacity().max(1);
            let name = sub.name();
            let (tx, mut rx) = mpsc::channel::<Arc<Signal>>(cap);
            let bus_for_worker = bus.clone();

            let handle = tokio::spawn(async move {
                while let Some(sig) = rx.recv().await {
                    let fut = sub.on_signal(sig.as_ref());
                    if let Err(panic_err) = std::panic::AssertUnwindSafe(fut).catch_unwind().await
                    {
                        let info = panic_info(&*panic_err);
                        bus_for_worker.publish(Signal::subscriber_panicked(sub.name(), info));
                    }
                }
            });
            channels.push(SubscriberChannel { name, sender: tx });
            workers.push(handle);
        }
        Self {
            channels,
            workers,
            bus,
        }
    }

    /// Emits a signal to all subscribers (clones it once into an `Arc`).
    pub fn emit(&self, signal: &Signal) {
        self.emit_arc(Arc::new(signal.clone()));
    }

    /// Emits a pre-allocated `Arc<Signal>` to all subscribers.
    ///
    /// Overflow signals that themselves overflow are not re-published.
    pub fn emit_arc(&self, signal: Arc<Signal>) {
        let is_overflow = matches!(signal.kind, SignalKind::SubscriberOverflow);

        for channel in &self.channels {
            let reason = match channel.sender.try_send(Arc::clone(&signal)) {
                Ok(()) => continue,
                Err(mpsc::error::TrySendError::Full(_)) => "full",
                Err(mpsc::error::TrySendError::Closed(_)) => "closed",
            };
            if !is_overflow {
                self.bus
                    .publish(Signal::subscriber_overflow(channel.name, reason));
            }
        }
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Closes every queue and awaits the workers.
    pub async fn shutdown(self) {
        drop(self.channels);
        for h in self.workers {
            let _ = h.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    struct Collect(Mutex<Vec<SignalKind>>);

    #[async_trait]
    impl Subscribe for Collect {
        async fn on_signal(&self, signal: &Signal) {
            self.0.lock().push(signal.kind);
        }
        fn name(&self) -> &'static str {
            "collect"
        }
    }

    struct Explode;

    #[async_trait]
    impl Subscribe for Explode {
        async fn on_signal(&self, _signal: &Signal) {
            panic!("subscriber exploded");
        }
        fn name(&self) -> &'static str {
            "explode"
        }
    }

    #[tokio::test]
    async fn test_panicking_subscriber_does_not_starve_others() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let collect = Arc::new(Collect(Mutex::new(Vec::new())));
        let set = SubscriberSet::new(vec![Arc::new(Explode), collect.clone()], bus.clone());
        assert_eq!(set.len(), 2);

        set.emit(&Signal::new(SignalKind::ServiceStarted));
        set.emit(&Signal::new(SignalKind::ServiceStopped));
        set.shutdown().await;

        assert_eq!(
            *collect.0.lock(),
            vec![SignalKind::ServiceStarted, SignalKind::ServiceStopped]
        );
        let first = rx.recv().await.expect("panic signal");
        assert_eq!(first.kind, SignalKind::SubscriberPanicked);
        assert_eq!(first.reason.as_deref(), Some("subscriber exploded"));
    }
}
