//! # Index contract.
//!
//! [`Index`] is a [`Service`] so an index takes part in transitions like any
//! other component: an equivalent index declared by a new core keeps the live
//! one, and with it every stored entry.
//!
//! Timestamp validation lives in [`WrappedIndex`](crate::index::WrappedIndex),
//! which rejects events without a `time` with a [`ValidationError`].

use crate::error::ValidationError;
use crate::event::{Event, Query};
use crate::service::Service;

/// Queryable store of the latest event per `(host, service)`.
///
/// Implementations must be safe for concurrent insert/delete/expire/search:
/// stream handlers run on every caller's thread.
pub trait Index: Service {
    /// Removes every entry.
    fn clear(&self);

    /// Removes the entry with the same `(host, service)` as `event`.
    fn delete(&self, event: &Event);

    /// Removes the entry for `event`'s key only if it is identical to `event`.
    fn delete_exactly(&self, event: &Event);

    /// Drains and returns every entry whose TTL has elapsed.
    fn expire(&self) -> Vec<Event>;

    fn search(&self, query: &Query) -> Vec<Event>;

    fn lookup(&self, host: &str, service: &str) -> Option<Event>;

    /// Stores `event`, replacing the entry with the same key.
    fn insert(&self, event: Event) -> Result<(), ValidationError>;

    /// Current contents.
    fn snapshot(&self) -> Vec<Event>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
