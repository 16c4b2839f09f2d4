//! First-come first-served matchmaking queue.
//!
//! The queue pairs the two longest-waiting players. Rating-based matching
//! is handled elsewhere; this queue only guarantees FIFO order and that
//! nobody is queued twice.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;

use super::{GameRegistry, PlayerDirectory};
use crate::domain::{GameEntry, PlayerId, PlayerState};
use crate::error::LobbyError;

/// Name of the one-versus-one ladder queue.
pub const LADDER_QUEUE_NAME: &str = "ladder1v1";

/// A player waiting in the queue.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Search {
    /// Searching player.
    pub player: PlayerId,
    /// When the search started.
    pub queued_at: DateTime<Utc>,
}

/// Snapshot of a queue for the control plane.
#[derive(Debug, Clone, Serialize)]
pub struct QueueSummary {
    /// Queue name.
    pub name: String,
    /// Number of waiting players.
    pub depth: usize,
    /// Waiting players, oldest first.
    pub searches: Vec<Search>,
}

/// Named matchmaking queue.
///
/// Built after the [`PlayerDirectory`] and [`GameRegistry`] it depends on.
#[derive(Debug)]
pub struct MatchmakerQueue {
    name: String,
    players: Arc<PlayerDirectory>,
    games: Arc<GameRegistry>,
    searches: Mutex<VecDeque<Search>>,
}

impl MatchmakerQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new(name: &str, players: Arc<PlayerDirectory>, games: Arc<GameRegistry>) -> Self {
        Self {
            name: name.to_string(),
            players,
            games,
            searches: Mutex::new(VecDeque::new()),
        }
    }

    /// Queue name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Starts a search for `player`, returning its 1-based queue position.
    ///
    /// # Errors
    ///
    /// Returns [`LobbyError::PlayerNotFound`] for offline players and
    /// [`LobbyError::AlreadySearching`] if the player is already queued.
    pub async fn push(&self, player: PlayerId) -> Result<usize, LobbyError> {
        self.players.get(player).await?;

        let position = {
            let mut searches = self.searches.lock().await;
            if searches.iter().any(|s| s.player == player) {
                return Err(LobbyError::AlreadySearching(player));
            }
            searches.push_back(Search {
                player,
                queued_at: Utc::now(),
            });
            searches.len()
        };

        self.players.set_state(player, PlayerState::Searching).await?;
        tracing::debug!(queue = %self.name, %player, position, "search started");
        Ok(position)
    }

    /// Withdraws a search. Returns `false` if the player was not queued.
    pub async fn cancel(&self, player: PlayerId) -> bool {
        let removed = {
            let mut searches = self.searches.lock().await;
            let before = searches.len();
            searches.retain(|s| s.player != player);
            searches.len() != before
        };
        if removed {
            // The player may already be gone when cancelling on logout.
            let _ = self.players.set_state(player, PlayerState::Idle).await;
            tracing::debug!(queue = %self.name, %player, "search cancelled");
        }
        removed
    }

    /// Pairs the two oldest searches into a new game.
    ///
    /// Returns `Ok(None)` when fewer than two players are waiting. If one
    /// of the pair went offline in the meantime, the other is put back at
    /// the head of the queue (if still online) and `Ok(None)` is returned.
    ///
    /// # Errors
    ///
    /// Propagates registry failures other than a vanished player.
    pub async fn try_match(&self) -> Result<Option<GameEntry>, LobbyError> {
        let (first, second) = {
            let mut searches = self.searches.lock().await;
            if searches.len() < 2 {
                return Ok(None);
            }
            match (searches.pop_front(), searches.pop_front()) {
                (Some(first), Some(second)) => (first, second),
                _ => return Ok(None),
            }
        };

        let title = format!("{}: {} vs {}", self.name, first.player, second.player);
        match self.games.create_match(first.player, second.player, &title).await {
            Ok(game) => Ok(Some(game)),
            Err(LobbyError::PlayerNotFound(gone)) => {
                let survivor = if gone == first.player { second } else { first };
                if self.players.get(survivor.player).await.is_ok() {
                    self.searches.lock().await.push_front(survivor);
                    tracing::warn!(queue = %self.name, %gone, "matched player went offline; search requeued");
                } else {
                    tracing::warn!(queue = %self.name, %gone, "both matched players went offline; searches dropped");
                }
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Returns `true` if `player` is waiting in this queue.
    pub async fn contains(&self, player: PlayerId) -> bool {
        self.searches.lock().await.iter().any(|s| s.player == player)
    }

    /// Number of waiting players.
    pub async fn len(&self) -> usize {
        self.searches.lock().await.len()
    }

    /// Returns `true` if nobody is waiting.
    pub async fn is_empty(&self) -> bool {
        self.searches.lock().await.is_empty()
    }

    /// Snapshot for reporting.
    pub async fn summary(&self) -> QueueSummary {
        let searches: Vec<Search> = self.searches.lock().await.iter().copied().collect();
        QueueSummary {
            name: self.name.clone(),
            depth: searches.len(),
            searches,
        }
    }
}
