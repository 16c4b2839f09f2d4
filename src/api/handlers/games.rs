//! Game registry and matchmaker handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::app_state::AppState;
use crate::domain::{GameEntry, GameId};
use crate::error::LobbyError;
use crate::service::QueueSummary;

/// Response for `GET /games`.
#[derive(Debug, Serialize)]
struct GameListResponse {
    total: usize,
    games: Vec<GameEntry>,
}

/// `GET /games`: Open and running games, oldest first.
pub async fn list_games(State(state): State<AppState>) -> impl IntoResponse {
    let games = state.services.games.list().await;
    Json(GameListResponse {
        total: games.len(),
        games,
    })
}

/// `GET /games/{id}`: One game.
///
/// # Errors
///
/// Returns [`LobbyError::GameNotFound`] if the id is unknown.
pub async fn get_game(
    State(state): State<AppState>,
    Path(id): Path<GameId>,
) -> Result<Json<GameEntry>, LobbyError> {
    Ok(Json(state.services.games.get(id).await?))
}

/// `DELETE /games/{id}`: Ends a game and returns its players to idle.
///
/// # Errors
///
/// Returns [`LobbyError::GameNotFound`] if the id is unknown.
pub async fn delete_game(
    State(state): State<AppState>,
    Path(id): Path<GameId>,
) -> Result<StatusCode, LobbyError> {
    state.services.games.remove(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /matchmaker`: Ladder queue snapshot.
pub async fn matchmaker_summary(State(state): State<AppState>) -> Json<QueueSummary> {
    Json(state.services.ladder.summary().await)
}

/// Game and matchmaker routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/games", get(list_games))
        .route("/games/{id}", get(get_game).delete(delete_game))
        .route("/matchmaker", get(matchmaker_summary))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use axum::http::Method;

    use super::super::test_support::{call, services};
    use crate::domain::{GameId, PlayerId, PlayerState};

    #[tokio::test]
    async fn delete_ends_game() {
        let services = services();
        services.players.login(PlayerId::new(1), "host").await;
        let Ok(game) = services.games.host(PlayerId::new(1), "custom").await else {
            panic!("host should succeed");
        };
        let uri = format!("/api/v1/games/{}", game.id);

        let (status, body) = call(&services, Method::GET, &uri).await;
        assert_eq!(status, 200);
        assert_eq!(body["title"], "custom");

        let (status, _) = call(&services, Method::DELETE, &uri).await;
        assert_eq!(status, 204);
        assert!(services.games.is_empty().await);
        let Ok(host) = services.players.get(PlayerId::new(1)).await else {
            panic!("host still online");
        };
        assert_eq!(host.state, PlayerState::Idle);

        let (status, body) = call(&services, Method::DELETE, &uri).await;
        assert_eq!(status, 404);
        assert_eq!(body["error"]["code"], 2002);
    }

    #[tokio::test]
    async fn unknown_game_is_404() {
        let services = services();
        let uri = format!("/api/v1/games/{}", GameId::new());
        let (status, _) = call(&services, Method::GET, &uri).await;
        assert_eq!(status, 404);
    }

    #[tokio::test]
    async fn matchmaker_shows_waiting_players() {
        let services = services();
        services.players.login(PlayerId::new(5), "solo").await;
        assert!(services.ladder.push(PlayerId::new(5)).await.is_ok());

        let (status, body) = call(&services, Method::GET, "/api/v1/matchmaker").await;
        assert_eq!(status, 200);
        assert_eq!(body["name"], "ladder1v1");
        assert_eq!(body["depth"], 1);
        assert_eq!(body["searches"][0]["player"], 5);
    }
}
