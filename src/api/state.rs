//! Application state for the API server

use crate::{Config, ModelPuller};
use std::sync::Arc;

/// Shared application state accessible to all route handlers
///
/// Cloned for each request; every field is a cheap handle.
#[derive(Clone)]
pub struct AppState {
    /// The pull driver
    pub puller: ModelPuller,

    /// Configuration (read-only)
    pub config: Arc<Config>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(puller: ModelPuller, config: Arc<Config>) -> Self {
        Self { puller, config }
    }
}
