//! Administrative HTTP server.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::app_state::AppState;
use crate::service::ServiceGraph;

/// Per-request time budget on the control plane.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Builds the control-plane router over `services`.
pub fn router(services: Arc<ServiceGraph>) -> Router {
    api::build_router()
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(REQUEST_TIMEOUT)),
        )
        .with_state(AppState::new(services))
}

/// Serves the control plane until `token` is cancelled, then lets
/// in-flight requests finish.
pub async fn serve(listener: TcpListener, services: Arc<ServiceGraph>, token: CancellationToken) {
    let app = router(services);
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(token.cancelled_owned())
        .await
    {
        tracing::error!(error = %e, "control server failed");
    }
    tracing::info!("control listener closed");
}
