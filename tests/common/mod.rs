//! Common test utilities for pull-progress integration tests

#[allow(dead_code)]
pub mod assertions;
#[allow(dead_code)]
pub mod registry;

#[allow(unused_imports)]
pub use assertions::*;
#[allow(unused_imports)]
pub use registry::*;
