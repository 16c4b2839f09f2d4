//! Directory of players currently connected to the lobby.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use tokio::sync::RwLock;

use super::MatchmakerQueue;
use crate::domain::{Player, PlayerId, PlayerState};
use crate::error::LobbyError;
use crate::persistence::DatabasePool;

/// Online players keyed by account id.
///
/// The directory is built before the matchmaking queue (the queue needs
/// it), so its reference to the ladder queue is attached afterwards with
/// [`PlayerDirectory::attach_ladder_queue`]. That reference is a [`Weak`]:
/// the server owns the queue, the directory only points at it.
#[derive(Debug)]
pub struct PlayerDirectory {
    db: DatabasePool,
    players: RwLock<HashMap<PlayerId, Player>>,
    ladder_queue: OnceLock<Weak<MatchmakerQueue>>,
    next_session: AtomicU64,
}

impl PlayerDirectory {
    /// Creates an empty directory backed by `db`.
    #[must_use]
    pub fn new(db: DatabasePool) -> Self {
        Self {
            db,
            players: RwLock::new(HashMap::new()),
            ladder_queue: OnceLock::new(),
            next_session: AtomicU64::new(1),
        }
    }

    /// Shared database pool.
    #[must_use]
    pub fn db(&self) -> &DatabasePool {
        &self.db
    }

    /// Wires the back-reference to the ladder queue. Can only happen once.
    ///
    /// # Errors
    ///
    /// Returns [`LobbyError::Service`] if a queue is already attached.
    pub fn attach_ladder_queue(&self, queue: &Arc<MatchmakerQueue>) -> Result<(), LobbyError> {
        self.ladder_queue
            .set(Arc::downgrade(queue))
            .map_err(|_| LobbyError::Service("ladder queue already attached".to_string()))?;
        tracing::debug!(queue = queue.name(), "ladder queue attached to player directory");
        Ok(())
    }

    /// The attached ladder queue, if wired and still alive.
    #[must_use]
    pub fn ladder_queue(&self) -> Option<Arc<MatchmakerQueue>> {
        self.ladder_queue.get().and_then(Weak::upgrade)
    }

    /// Registers a player as online. A second login for the same id
    /// replaces the previous session; the returned [`Player::session`]
    /// identifies this login for [`PlayerDirectory::logout_session`].
    pub async fn login(&self, id: PlayerId, login: &str) -> Player {
        let session = self.next_session.fetch_add(1, Ordering::Relaxed);
        let player = Player::new(id, login.to_string(), session);
        let previous = self.players.write().await.insert(id, player.clone());
        if previous.is_some() {
            tracing::info!(player_id = %id, login, "player re-logged in; replacing session");
        } else {
            tracing::info!(player_id = %id, login, "player logged in");
        }
        player
    }

    /// Removes a player and withdraws any pending ladder search.
    pub async fn logout(&self, id: PlayerId) -> Option<Player> {
        let removed = self.players.write().await.remove(&id);
        self.finish_logout(id, removed).await
    }

    /// Like [`PlayerDirectory::logout`], but only if the entry still
    /// belongs to `session`. A connection whose login was replaced by a
    /// newer one must not log the newer one out.
    pub async fn logout_session(&self, id: PlayerId, session: u64) -> Option<Player> {
        let removed = {
            let mut players = self.players.write().await;
            match players.get(&id) {
                Some(player) if player.session == session => players.remove(&id),
                Some(_) => {
                    tracing::debug!(player_id = %id, session, "login was replaced; keeping newer session");
                    None
                }
                None => None,
            }
        };
        self.finish_logout(id, removed).await
    }

    async fn finish_logout(&self, id: PlayerId, removed: Option<Player>) -> Option<Player> {
        if removed.is_some() {
            if let Some(queue) = self.ladder_queue() {
                queue.cancel(id).await;
            }
            tracing::info!(player_id = %id, "player logged out");
        }
        removed
    }

    /// Looks up an online player.
    ///
    /// # Errors
    ///
    /// Returns [`LobbyError::PlayerNotFound`] if the player is offline.
    pub async fn get(&self, id: PlayerId) -> Result<Player, LobbyError> {
        self.players
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(LobbyError::PlayerNotFound(id))
    }

    /// Updates a player's lobby state.
    ///
    /// # Errors
    ///
    /// Returns [`LobbyError::PlayerNotFound`] if the player is offline.
    pub async fn set_state(&self, id: PlayerId, state: PlayerState) -> Result<(), LobbyError> {
        let mut map = self.players.write().await;
        let player = map.get_mut(&id).ok_or(LobbyError::PlayerNotFound(id))?;
        player.state = state;
        Ok(())
    }

    /// All online players, ordered by id.
    pub async fn list(&self) -> Vec<Player> {
        let mut players: Vec<Player> = self.players.read().await.values().cloned().collect();
        players.sort_by_key(|p| p.id);
        players
    }

    /// Number of online players.
    pub async fn len(&self) -> usize {
        self.players.read().await.len()
    }

    /// Returns `true` if nobody is online.
    pub async fn is_empty(&self) -> bool {
        self.players.read().await.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::persistence::MockPool;

    fn directory() -> PlayerDirectory {
        PlayerDirectory::new(DatabasePool::Mock(MockPool::new(1)))
    }

    #[tokio::test]
    async fn login_and_get() {
        let players = directory();
        players.login(PlayerId::new(1), "alice").await;

        let Ok(player) = players.get(PlayerId::new(1)).await else {
            panic!("player should be online");
        };
        assert_eq!(player.login, "alice");
        assert_eq!(player.state, PlayerState::Idle);
        assert_eq!(players.len().await, 1);
    }

    #[tokio::test]
    async fn logout_removes_player() {
        let players = directory();
        players.login(PlayerId::new(1), "alice").await;
        assert!(players.logout(PlayerId::new(1)).await.is_some());
        assert!(players.is_empty().await);
        assert!(players.logout(PlayerId::new(1)).await.is_none());
    }

    #[tokio::test]
    async fn replaced_session_cannot_log_out_newer_login() {
        let players = directory();
        let old = players.login(PlayerId::new(5), "alice").await;
        let new = players.login(PlayerId::new(5), "alice").await;
        assert_ne!(old.session, new.session);

        assert!(players.logout_session(PlayerId::new(5), old.session).await.is_none());
        assert!(players.get(PlayerId::new(5)).await.is_ok());

        assert!(players.logout_session(PlayerId::new(5), new.session).await.is_some());
        assert!(players.is_empty().await);
    }

    #[tokio::test]
    async fn unknown_player_is_not_found() {
        let players = directory();
        let result = players.get(PlayerId::new(9)).await;
        assert!(matches!(result, Err(LobbyError::PlayerNotFound(_))));
        let result = players.set_state(PlayerId::new(9), PlayerState::Searching).await;
        assert!(matches!(result, Err(LobbyError::PlayerNotFound(_))));
    }

    #[tokio::test]
    async fn list_is_sorted_by_id() {
        let players = directory();
        players.login(PlayerId::new(3), "carol").await;
        players.login(PlayerId::new(1), "alice").await;
        let ids: Vec<i64> = players.list().await.iter().map(|p| p.id.get()).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn ladder_queue_absent_until_attached() {
        let players = directory();
        assert!(players.ladder_queue().is_none());
    }
}
