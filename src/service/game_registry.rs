//! Registry of hosted and running games.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use super::PlayerDirectory;
use crate::domain::{GameEntry, GameId, GameStatus, PlayerId, PlayerState};
use crate::error::LobbyError;

/// Central store for all games.
///
/// Every game references online players only; the registry checks the
/// [`PlayerDirectory`] before creating a game and moves its players to
/// [`PlayerState::InGame`].
#[derive(Debug)]
pub struct GameRegistry {
    players: Arc<PlayerDirectory>,
    games: RwLock<HashMap<GameId, GameEntry>>,
}

impl GameRegistry {
    /// Creates an empty registry over `players`.
    #[must_use]
    pub fn new(players: Arc<PlayerDirectory>) -> Self {
        Self {
            players,
            games: RwLock::new(HashMap::new()),
        }
    }

    /// Player directory this registry validates against.
    #[must_use]
    pub fn players(&self) -> &Arc<PlayerDirectory> {
        &self.players
    }

    /// Opens a custom game hosted by `host`.
    ///
    /// # Errors
    ///
    /// Returns [`LobbyError::PlayerNotFound`] if the host is offline.
    pub async fn host(&self, host: PlayerId, title: &str) -> Result<GameEntry, LobbyError> {
        self.players.get(host).await?;
        let entry = GameEntry::new(host, title.to_string());
        self.players.set_state(host, PlayerState::InGame).await?;
        self.games.write().await.insert(entry.id, entry.clone());
        tracing::info!(game_id = %entry.id, %host, title, "game hosted");
        Ok(entry)
    }

    /// Creates a game for two matched players and marks it as playing.
    ///
    /// # Errors
    ///
    /// Returns [`LobbyError::PlayerNotFound`] naming the first player who
    /// is no longer online.
    pub async fn create_match(
        &self,
        first: PlayerId,
        second: PlayerId,
        title: &str,
    ) -> Result<GameEntry, LobbyError> {
        self.players.get(first).await?;
        self.players.get(second).await?;

        let mut entry = GameEntry::new(first, title.to_string());
        entry.players.push(second);
        entry.status = GameStatus::Playing;

        for player in &entry.players {
            self.players.set_state(*player, PlayerState::InGame).await?;
        }
        self.games.write().await.insert(entry.id, entry.clone());
        tracing::info!(game_id = %entry.id, %first, %second, "match created");
        Ok(entry)
    }

    /// Looks up a game.
    ///
    /// # Errors
    ///
    /// Returns [`LobbyError::GameNotFound`] if no such game exists.
    pub async fn get(&self, id: GameId) -> Result<GameEntry, LobbyError> {
        self.games
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(LobbyError::GameNotFound(id))
    }

    /// Game the player is currently assigned to, if any.
    pub async fn game_of(&self, player: PlayerId) -> Option<GameEntry> {
        self.games
            .read()
            .await
            .values()
            .find(|game| game.players.contains(&player))
            .cloned()
    }

    /// Ends a game, returning its players to the idle state.
    ///
    /// # Errors
    ///
    /// Returns [`LobbyError::GameNotFound`] if no such game exists.
    pub async fn remove(&self, id: GameId) -> Result<GameEntry, LobbyError> {
        let entry = self
            .games
            .write()
            .await
            .remove(&id)
            .ok_or(LobbyError::GameNotFound(id))?;
        for player in &entry.players {
            // Players who already left have nothing to reset.
            let _ = self.players.set_state(*player, PlayerState::Idle).await;
        }
        tracing::info!(game_id = %id, "game removed");
        Ok(entry)
    }

    /// Detaches a player who went offline from their game. The game is
    /// removed once none of its remaining players is online. Returns the
    /// id of the removed game, if any.
    pub async fn leave(&self, player: PlayerId) -> Option<GameId> {
        let (id, remaining) = {
            let mut games = self.games.write().await;
            let game = games.values_mut().find(|game| game.players.contains(&player))?;
            game.players.retain(|p| *p != player);
            (game.id, game.players.clone())
        };
        tracing::debug!(game_id = %id, %player, "player left game");

        for other in &remaining {
            if self.players.get(*other).await.is_ok() {
                return None;
            }
        }
        match self.remove(id).await {
            Ok(_) => Some(id),
            // Removed concurrently by another leave or an operator.
            Err(_) => None,
        }
    }

    /// All games, oldest first.
    pub async fn list(&self) -> Vec<GameEntry> {
        let mut games: Vec<GameEntry> = self.games.read().await.values().cloned().collect();
        games.sort_by_key(|g| g.created_at);
        games
    }

    /// Number of games.
    pub async fn len(&self) -> usize {
        self.games.read().await.len()
    }

    /// Returns `true` if there are no games.
    pub async fn is_empty(&self) -> bool {
        self.games.read().await.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::persistence::{DatabasePool, MockPool};

    async fn registry_with(ids: &[i64]) -> GameRegistry {
        let players = Arc::new(PlayerDirectory::new(DatabasePool::Mock(MockPool::new(1))));
        for id in ids {
            players.login(PlayerId::new(*id), &format!("p{id}")).await;
        }
        GameRegistry::new(players)
    }

    #[tokio::test]
    async fn host_requires_online_player() {
        let games = registry_with(&[]).await;
        let result = games.host(PlayerId::new(1), "custom").await;
        assert!(matches!(result, Err(LobbyError::PlayerNotFound(_))));
        assert!(games.is_empty().await);
    }

    #[tokio::test]
    async fn host_moves_player_in_game() {
        let games = registry_with(&[1]).await;
        let Ok(game) = games.host(PlayerId::new(1), "custom").await else {
            panic!("host should succeed");
        };
        assert_eq!(game.status, GameStatus::Lobby);
        let Ok(player) = games.players().get(PlayerId::new(1)).await else {
            panic!("player still online");
        };
        assert_eq!(player.state, PlayerState::InGame);
        assert_eq!(games.game_of(PlayerId::new(1)).await.map(|g| g.id), Some(game.id));
    }

    #[tokio::test]
    async fn create_match_and_remove() {
        let games = registry_with(&[1, 2]).await;
        let Ok(game) = games.create_match(PlayerId::new(1), PlayerId::new(2), "ladder").await
        else {
            panic!("match should be created");
        };
        assert_eq!(game.players, vec![PlayerId::new(1), PlayerId::new(2)]);
        assert_eq!(game.status, GameStatus::Playing);
        assert_eq!(games.len().await, 1);

        assert!(games.remove(game.id).await.is_ok());
        assert!(games.get(game.id).await.is_err());
        let Ok(player) = games.players().get(PlayerId::new(2)).await else {
            panic!("player still online");
        };
        assert_eq!(player.state, PlayerState::Idle);
    }

    #[tokio::test]
    async fn game_is_removed_when_last_online_player_leaves() {
        let games = registry_with(&[1, 2]).await;
        let Ok(game) = games.create_match(PlayerId::new(1), PlayerId::new(2), "ladder").await
        else {
            panic!("match should be created");
        };

        let _ = games.players().logout(PlayerId::new(1)).await;
        assert_eq!(games.leave(PlayerId::new(1)).await, None);
        let Ok(kept) = games.get(game.id).await else {
            panic!("game survives while player 2 is online");
        };
        assert_eq!(kept.players, vec![PlayerId::new(2)]);

        let _ = games.players().logout(PlayerId::new(2)).await;
        assert_eq!(games.leave(PlayerId::new(2)).await, Some(game.id));
        assert!(games.is_empty().await);
        assert_eq!(games.leave(PlayerId::new(2)).await, None);
    }

    #[tokio::test]
    async fn remove_unknown_game_fails() {
        let games = registry_with(&[]).await;
        let result = games.remove(GameId::new()).await;
        assert!(matches!(result, Err(LobbyError::GameNotFound(_))));
    }
}
