//! Online player records.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Numeric player identifier, as assigned by the accounts database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(i64);

impl PlayerId {
    /// Wraps a raw account id.
    #[must_use]
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Returns the raw account id.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a player currently is inside the lobby.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerState {
    /// Connected and idle.
    Idle,
    /// Waiting in a matchmaking queue.
    Searching,
    /// Assigned to a game.
    InGame,
}

/// A player currently connected to the lobby.
#[derive(Debug, Clone, Serialize)]
pub struct Player {
    /// Account identifier.
    pub id: PlayerId,
    /// Display name.
    pub login: String,
    /// Current lobby state.
    pub state: PlayerState,
    /// When the player logged in.
    pub logged_in_at: DateTime<Utc>,
    /// Identifies the login that created this entry; a later login for
    /// the same id gets a new value.
    #[serde(skip)]
    pub session: u64,
}

impl Player {
    /// Creates an idle player that just logged in.
    #[must_use]
    pub fn new(id: PlayerId, login: String, session: u64) -> Self {
        Self {
            id,
            login,
            state: PlayerState::Idle,
            logged_in_at: Utc::now(),
            session,
        }
    }
}
