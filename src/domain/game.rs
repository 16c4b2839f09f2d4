//! Hosted game entries.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{GameId, PlayerId};

/// Lifecycle of a hosted game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    /// Host is waiting for players to join.
    Lobby,
    /// The match is being played.
    Playing,
}

/// A game known to the registry.
#[derive(Debug, Clone, Serialize)]
pub struct GameEntry {
    /// Unique game identifier (immutable after creation).
    pub id: GameId,
    /// Player hosting the game.
    pub host: PlayerId,
    /// Title shown in the game list.
    pub title: String,
    /// Players assigned to the game, host first.
    pub players: Vec<PlayerId>,
    /// Current status.
    pub status: GameStatus,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl GameEntry {
    /// Creates a game in the [`GameStatus::Lobby`] state with only its host.
    #[must_use]
    pub fn new(host: PlayerId, title: String) -> Self {
        Self {
            id: GameId::new(),
            host,
            title,
            players: vec![host],
            status: GameStatus::Lobby,
            created_at: Utc::now(),
        }
    }
}
