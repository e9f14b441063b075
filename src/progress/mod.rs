//! Pull progress aggregation and reconciliation engine.
//!
//! The engine is a passive state holder split into focused submodules:
//! - [`event`] - Raw stream lines and their normalized [`ProgressEvent`] form
//! - [`part`] - Per-part progress ([`PartTracker`])
//! - [`session`] - Per-artifact lifecycle and aggregation ([`PullSession`])
//! - [`registry`] - All sessions of the process ([`PullRegistry`])
//!
//! Every operation here is synchronous and bounded: nothing blocks on I/O,
//! nothing times out on its own. Transport drivers push events in, the
//! presentation layer reads snapshots out.

pub mod event;
pub mod part;
pub mod registry;
pub mod session;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use event::{ProgressEvent, ProgressLine};
pub use part::PartTracker;
pub use registry::{Attach, Dismissal, PullRegistry, Routed, SessionHandle};
pub use session::PullSession;
