//! Core snapshot and live-core orchestration.
//!
//! - [`Core`]: immutable configuration snapshot (streams, services, index,
//!   pub/sub, metrics sink) and the `stream` entry point;
//! - [`transition`]: merge + stop/reload/start choreography;
//! - [`Supervisor`]: the single owner of the live core;
//! - [`shutdown`]: cross-platform shutdown signal handling.
//!
//! ```text
//! config ──► Core (new) ──► Supervisor::transition_to(new)
//!                              ├─► merge(old, new)          (pure)
//!                              ├─► stop   abandoned services (parallel)
//!                              ├─► reload merged services    (parallel)
//!                              ├─► start  merged services    (parallel)
//!                              └─► swap live reference
//!
//! events ──► Supervisor::stream(ev) ──► Core::stream ──► handler 1 … handler N
//!                 ▲                                             │
//!                 └──────── reaper / discovery (reinjection) ◄──┘
//! ```

mod builder;
mod shutdown;
mod snapshot;
mod stream;
mod supervisor;
mod transition;

pub use builder::SupervisorBuilder;
pub use shutdown::wait_for_shutdown_signal;
pub use snapshot::{Core, CoreBuilder};
pub use stream::{StreamFn, index_stream, publish_stream, stream_fn};
pub(crate) use stream::isolate;
pub use supervisor::Supervisor;
pub use transition::{LifecycleFailure, Transition, bootstrap, merge, transition};
