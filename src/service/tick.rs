//! # One unit of periodic work.
//!
//! A [`Tick`] is invoked by a [`PeriodicService`](crate::PeriodicService) once
//! per interval with the core the service was last reloaded with. [`TickFn`]
//! adapts a closure; each call produces a fresh future.
//!
//! ## Example
//! ```rust
//! use tokio_util::sync::CancellationToken;
//! use corevisor::{Core, TickError, TickFn, TickRef};
//!
//! let t: TickRef = TickFn::arc(|core: Core, _ctx: CancellationToken| async move {
//!     let _ = core.streams().len();
//!     Ok::<(), TickError>(())
//! });
//! ```

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::core::Core;
use crate::error::TickError;

/// Periodic unit of work.
///
/// Implementations should watch `ctx` and return [`TickError::Canceled`]
/// promptly when it fires; the scheduler drops ticks that do not.
#[async_trait]
pub trait Tick: Send + Sync + 'static {
    async fn tick(&self, core: &Core, ctx: CancellationToken) -> Result<(), TickError>;
}

/// Shared tick handle.
pub type TickRef = Arc<dyn Tick>;

/// Function-backed tick.
pub struct TickFn<F> {
    f: F,
}

impl<F> TickFn<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }

    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self::new(f))
    }
}

#[async_trait]
impl<F, Fut> Tick for TickFn<F>
where
    F: Fn(Core, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), TickError>> + Send + 'static,
{
    async fn tick(&self, core: &Core, ctx: CancellationToken) -> Result<(), TickError> {
        (self.f)(core.clone(), ctx).await
    }
}
