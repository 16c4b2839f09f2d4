//! Control-plane HTTP API: route handlers and router composition.
//!
//! Read-only views of the lobby plus a handful of administrative actions.
//! Resource routes are mounted under `/api/v1`; `/health` sits at the root.

pub mod handlers;

use axum::Router;

use crate::app_state::AppState;

/// Builds the complete control-plane router.
pub fn build_router() -> Router<AppState> {
    Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes())
}
