//! # Index: latest event per `(host, service)`.
//!
//! - [`Index`]: the contract the core consumes (a [`Service`](crate::Service)
//!   with insert/delete/expire/search/lookup)
//! - [`MemoryIndex`]: concurrent in-memory implementation with TTL expiry
//! - [`WrappedIndex`]: decorator adding timestamp validation and fan-out on
//!   the [`INDEX_CHANNEL`] pub/sub channel
//!
//! A [`Core`](crate::Core) always holds its index wrapped; the raw index
//! survives transitions and is rewrapped around the merged pub/sub registry.

mod index;
mod memory;
mod wrapped;

pub use index::Index;
pub use memory::{DEFAULT_TTL, MemoryIndex};
pub use wrapped::{INDEX_CHANNEL, WrappedIndex};
