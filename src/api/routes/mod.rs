//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`pulls`] - Start, inspect, cancel and dismiss pulls
//! - [`system`] - Health, events, OpenAPI

mod pulls;
mod system;

// Re-export all handlers so `routes::function_name` works
pub use pulls::*;
pub use system::*;
