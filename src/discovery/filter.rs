use crate::core::{StreamFn, stream_fn};
use crate::discovery::{ADDED, DISCOVERY_TAG, REMOVED, SERVICE_PREFIX};
use crate::event::Event;
use crate::index::Index;

/// Event the filter indexes for a discovered service.
///
/// Only the service name changes: it gains [`SERVICE_PREFIX`] so it never
/// collides with the service's own events.
pub fn derived_event(event: &Event) -> Event {
    let mut derived = event.clone();
    derived.service = Some(format!(
        "{SERVICE_PREFIX}{}",
        event.service.as_deref().unwrap_or_default()
    ));
    derived
}

/// Stream handler mirroring discovery membership into the index.
///
/// Events tagged [`DISCOVERY_TAG`]: `added` inserts the derived event,
/// `removed` deletes it. Everything else passes untouched.
pub fn filter() -> StreamFn {
    stream_fn(|core, event| {
        if !event.has_tag(DISCOVERY_TAG) {
            return Ok(());
        }
        let Some(index) = core.index() else {
            return Ok(());
        };
        match event.state.as_deref() {
            Some(ADDED) => index.insert(derived_event(event)).map_err(Into::into),
            Some(REMOVED) => {
                index.delete(&derived_event(event));
                Ok(())
            }
            _ => Ok(()),
        }
    })
}
