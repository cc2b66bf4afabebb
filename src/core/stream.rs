//! Stream handlers: the per-event processing pipeline of a [`Core`].
//!
//! A handler receives the core that is dispatching the event, so handlers
//! registered before a transition still reach the index and pub/sub registry
//! of whichever core is current.

use std::sync::Arc;

use crate::core::Core;
use crate::error::{ProcessingError, panic_info};
use crate::event::Event;
use crate::index::Index;
use crate::telemetry::{Signal, SignalKind};

/// A stream handler.
pub type StreamFn = Arc<dyn Fn(&Core, &Event) -> Result<(), ProcessingError> + Send + Sync>;

/// Wraps a closure as a [`StreamFn`].
pub fn stream_fn<F>(f: F) -> StreamFn
where
    F: Fn(&Core, &Event) -> Result<(), ProcessingError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Writes every event into the core's index.
///
/// Events in the `expired` state delete their entry instead of being stored.
/// Without an index the handler does nothing.
pub fn index_stream() -> StreamFn {
    stream_fn(|core, event| {
        let Some(index) = core.index() else {
            return Ok(());
        };
        if event.is_expired_state() {
            index.delete(event);
            Ok(())
        } else {
            index.insert(event.clone()).map_err(ProcessingError::from)
        }
    })
}

/// Publishes every event on `channel` of the core's pub/sub registry.
///
/// The index and the reaper already publish on [`INDEX_CHANNEL`]; registering
/// this handler for that channel delivers those events to its subscribers twice.
///
/// [`INDEX_CHANNEL`]: crate::index::INDEX_CHANNEL
pub fn publish_stream(channel: impl Into<String>) -> StreamFn {
    let channel: String = channel.into();
    stream_fn(move |core, event| {
        if let Some(pubsub) = core.pubsub() {
            pubsub.publish(&channel, event);
        }
        Ok(())
    })
}

/// Runs one unit of event processing on behalf of `source`, isolating it.
///
/// Failures and panics are logged and reported on the core's metrics sink;
/// the return value says whether the unit succeeded.
pub(crate) fn isolate<F>(core: &Core, source: &str, f: F) -> bool
where
    F: FnOnce() -> Result<(), ProcessingError>,
{
    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)).unwrap_or_else(
        |panic| {
            Err(ProcessingError::Panicked {
                info: panic_info(&*panic),
            })
        },
    );

    match outcome {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(source, error = %err, label = err.as_label(), "event processing failed");
            if let Some(bus) = core.bus() {
                bus.publish(
                    Signal::new(SignalKind::ProcessingFailed)
                        .with_service(source)
                        .with_reason(err.to_string()),
                );
            }
            false
        }
    }
}
