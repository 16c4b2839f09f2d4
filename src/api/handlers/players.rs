//! Player directory handlers: list, get.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::app_state::AppState;
use crate::domain::{Player, PlayerId};
use crate::error::LobbyError;

/// Response for `GET /players`.
#[derive(Debug, Serialize)]
struct PlayerListResponse {
    total: usize,
    players: Vec<Player>,
}

/// `GET /players`: Everyone currently logged in, ordered by id.
pub async fn list_players(State(state): State<AppState>) -> impl IntoResponse {
    let players = state.services.players.list().await;
    Json(PlayerListResponse {
        total: players.len(),
        players,
    })
}

/// `GET /players/{id}`: One logged-in player.
///
/// # Errors
///
/// Returns [`LobbyError::PlayerNotFound`] if the player is not online.
pub async fn get_player(
    State(state): State<AppState>,
    Path(id): Path<PlayerId>,
) -> Result<Json<Player>, LobbyError> {
    Ok(Json(state.services.players.get(id).await?))
}

/// Player routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/players", get(list_players))
        .route("/players/{id}", get(get_player))
}
