//! Control-plane handlers organized by resource.

pub mod games;
pub mod players;
pub mod system;

use axum::Router;

use crate::app_state::AppState;

/// Composes all resource routes under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(players::routes())
        .merge(games::routes())
}

#[cfg(test)]
#[allow(clippy::panic)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use axum::body::{Body, to_bytes};
    use axum::http::{Method, Request, StatusCode};
    use tower::ServiceExt;

    use crate::persistence::{DatabasePool, MockPool};
    use crate::server::control;
    use crate::service::ServiceGraph;

    pub(crate) fn services() -> Arc<ServiceGraph> {
        let Ok(graph) = ServiceGraph::build(DatabasePool::Mock(MockPool::new(4))) else {
            panic!("graph should build");
        };
        Arc::new(graph)
    }

    /// Sends one request through the full control router and returns the
    /// status with the decoded JSON body.
    pub(crate) async fn call(
        services: &Arc<ServiceGraph>,
        method: Method,
        uri: &str,
    ) -> (StatusCode, serde_json::Value) {
        let Ok(request) = Request::builder().method(method).uri(uri).body(Body::empty()) else {
            panic!("request should build");
        };
        let Ok(response) = control::router(Arc::clone(services)).oneshot(request).await else {
            panic!("router is infallible");
        };
        let status = response.status();
        let Ok(bytes) = to_bytes(response.into_body(), usize::MAX).await else {
            panic!("body should be readable");
        };
        let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, body)
    }
}
