//! System endpoints: health check.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::app_state::AppState;

/// Database part of the health report.
#[derive(Debug, Serialize)]
struct DatabaseHealth {
    backend: &'static str,
    connections: u32,
    reachable: bool,
}

/// Health check response.
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: String,
    version: &'static str,
    database: DatabaseHealth,
    players_online: usize,
    active_games: usize,
}

/// `GET /health`: Service health, including a database round trip.
///
/// Answers `503` when the database does not respond.
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let services = &state.services;
    let reachable = match services.db.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "health check database ping failed");
            false
        }
    };

    let status = if reachable {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthResponse {
            status: if reachable { "healthy" } else { "degraded" },
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION"),
            database: DatabaseHealth {
                backend: services.db.backend(),
                connections: services.db.size(),
                reachable,
            },
            players_online: services.players.len().await,
            active_games: services.games.len().await,
        }),
    )
}

/// System routes mounted at the root level (not under /api/v1).
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_handler))
}

#[cfg(test)]
mod tests {
    use axum::http::Method;

    use super::super::test_support::{call, services};

    #[tokio::test]
    async fn healthy_with_reachable_database() {
        let services = services();
        let (status, body) = call(&services, Method::GET, "/health").await;
        assert_eq!(status, 200);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["database"]["backend"], "mock");
        assert_eq!(body["players_online"], 0);
    }

    #[tokio::test]
    async fn degraded_once_database_is_closed() {
        let services = services();
        services.db.close().await;
        let (status, body) = call(&services, Method::GET, "/health").await;
        assert_eq!(status, 503);
        assert_eq!(body["database"]["reachable"], false);
    }
}
