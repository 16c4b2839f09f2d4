//! Game-traffic stream connections.
//!
//! Game connections only query game state; everything that changes lobby
//! state goes through the lobby listener.

use std::net::SocketAddr;
use std::sync::Arc;

use super::protocol::{Command, Reply};
use super::session::SessionHandler;
use crate::error::LobbyError;
use crate::service::ServiceGraph;

/// State of one game-traffic connection.
#[derive(Debug)]
pub struct GameSession {
    services: Arc<ServiceGraph>,
    peer: SocketAddr,
}

impl GameSession {
    /// Creates a session for `peer`.
    #[must_use]
    pub fn new(services: Arc<ServiceGraph>, peer: SocketAddr) -> Self {
        Self { services, peer }
    }
}

impl SessionHandler for GameSession {
    async fn handle(&mut self, command: Command) -> Reply {
        let result = match command {
            Command::Ping => Ok(Reply::Pong),
            Command::GameState { game_id } => self
                .services
                .games
                .get(game_id)
                .await
                .map(|game| Reply::GameState { game }),
            Command::GameList => Ok(Reply::GameList {
                games: self.services.games.list().await,
            }),
            other => {
                tracing::debug!(peer = %self.peer, ?other, "lobby command on game connection");
                Err(LobbyError::InvalidRequest(
                    "command not available on game connections".to_string(),
                ))
            }
        };
        result.unwrap_or_else(Reply::from)
    }

    async fn close(&mut self) {}
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::PlayerId;
    use crate::persistence::{DatabasePool, MockPool};

    #[tokio::test]
    async fn serves_game_state_but_not_lobby_commands() {
        let Ok(graph) = ServiceGraph::build(DatabasePool::Mock(MockPool::new(1))) else {
            panic!("graph should build");
        };
        let services = Arc::new(graph);
        services.players.login(PlayerId::new(1), "host").await;
        let Ok(hosted) = services.games.host(PlayerId::new(1), "custom").await else {
            panic!("host should succeed");
        };

        let mut session = GameSession::new(Arc::clone(&services), ([127, 0, 0, 1], 9).into());
        let Reply::GameState { game } = session.handle(Command::GameState { game_id: hosted.id }).await
        else {
            panic!("expected game state");
        };
        assert_eq!(game.id, hosted.id);

        let reply = session.handle(Command::SearchLadder).await;
        assert!(matches!(reply, Reply::Error { code: 1001, .. }));
    }
}
