//! Shared state injected into the control-plane handlers.

use std::sync::Arc;

use crate::service::ServiceGraph;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The wired service graph.
    pub services: Arc<ServiceGraph>,
}

impl AppState {
    /// Wraps the service graph for the router.
    #[must_use]
    pub const fn new(services: Arc<ServiceGraph>) -> Self {
        Self { services }
    }
}
