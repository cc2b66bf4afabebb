//! # Core subscriber trait
//!
//! `Subscribe` is the extension point for plugging custom signal handlers into
//! the runtime. Each subscriber is driven by a dedicated worker loop fed by a
//! bounded queue owned by the [`SubscriberSet`](crate::subscribers::SubscriberSet).
//!
//! ## Contract
//! - Implementations may be slow (I/O, batching); they do **not** block the
//!   publisher nor other subscribers.
//! - Each subscriber declares its queue capacity via [`Subscribe::queue_capacity`].
//!   On overflow, signals for that subscriber are **dropped** and a
//!   `SubscriberOverflow` signal is published.

use async_trait::async_trait;

use crate::telemetry::Signal;

/// Contract for signal subscribers.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handle a single signal.
    async fn on_signal(&self, signal: &Signal);

    /// Human-readable name (for logs/metrics).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Preferred capacity of this subscriber's queue.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
