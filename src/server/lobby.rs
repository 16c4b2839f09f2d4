//! Client-facing lobby connections.

use std::net::SocketAddr;
use std::sync::Arc;

use super::protocol::{Command, Reply};
use super::session::SessionHandler;
use crate::domain::PlayerId;
use crate::error::LobbyError;
use crate::service::ServiceGraph;

/// The login a lobby connection holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Login {
    player: PlayerId,
    session: u64,
}

/// State of one lobby connection.
#[derive(Debug)]
pub struct LobbySession {
    services: Arc<ServiceGraph>,
    peer: SocketAddr,
    login: Option<Login>,
}

impl LobbySession {
    /// Creates an anonymous session for `peer`.
    #[must_use]
    pub fn new(services: Arc<ServiceGraph>, peer: SocketAddr) -> Self {
        Self {
            services,
            peer,
            login: None,
        }
    }

    fn require_login(&self) -> Result<PlayerId, LobbyError> {
        self.login
            .map(|login| login.player)
            .ok_or_else(|| LobbyError::InvalidRequest("send hello first".to_string()))
    }

    async fn ensure_not_in_game(&self, player: PlayerId) -> Result<(), LobbyError> {
        match self.services.games.game_of(player).await {
            Some(game) => Err(LobbyError::InvalidRequest(format!(
                "already in game {}",
                game.id
            ))),
            None => Ok(()),
        }
    }

    /// Logs out this connection's login, unless a newer connection has
    /// taken it over, and detaches the player from their game.
    async fn release(&self, login: Login) {
        let services = &self.services;
        if services
            .players
            .logout_session(login.player, login.session)
            .await
            .is_some()
        {
            if let Some(game_id) = services.games.leave(login.player).await {
                tracing::info!(%game_id, player_id = %login.player, "game closed after last player left");
            }
        }
    }

    async fn dispatch(&mut self, command: Command) -> Result<Reply, LobbyError> {
        match command {
            Command::Ping => Ok(Reply::Pong),
            Command::Hello { player_id, login } => {
                let login = login.trim();
                if login.is_empty() {
                    return Err(LobbyError::InvalidRequest("login must not be empty".to_string()));
                }
                if let Some(previous) = self.login.filter(|l| l.player != player_id) {
                    self.release(previous).await;
                }
                let player = self.services.players.login(player_id, login).await;
                self.login = Some(Login {
                    player: player.id,
                    session: player.session,
                });
                tracing::debug!(peer = %self.peer, player_id = %player.id, "lobby hello");
                Ok(Reply::Welcome {
                    player_id: player.id,
                    login: player.login,
                })
            }
            Command::HostGame { title } => {
                let player = self.require_login()?;
                let title = title.trim();
                if title.is_empty() {
                    return Err(LobbyError::InvalidRequest("title must not be empty".to_string()));
                }
                self.ensure_not_in_game(player).await?;
                if self.services.ladder.contains(player).await {
                    return Err(LobbyError::AlreadySearching(player));
                }
                let game = self.services.games.host(player, title).await?;
                Ok(Reply::GameHosted { game })
            }
            Command::SearchLadder => {
                let player = self.require_login()?;
                self.ensure_not_in_game(player).await?;
                let ladder = &self.services.ladder;
                let position = ladder.push(player).await?;
                match ladder.try_match().await? {
                    Some(game) if game.players.contains(&player) => Ok(Reply::MatchFound { game }),
                    _ => Ok(Reply::SearchStarted {
                        queue: ladder.name().to_string(),
                        position,
                    }),
                }
            }
            Command::CancelSearch => {
                let player = self.require_login()?;
                let was_searching = self.services.ladder.cancel(player).await;
                Ok(Reply::SearchCancelled {
                    queue: self.services.ladder.name().to_string(),
                    was_searching,
                })
            }
            Command::GameList => Ok(Reply::GameList {
                games: self.services.games.list().await,
            }),
            Command::GameState { game_id } => Ok(Reply::GameState {
                game: self.services.games.get(game_id).await?,
            }),
        }
    }
}

impl SessionHandler for LobbySession {
    async fn handle(&mut self, command: Command) -> Reply {
        self.dispatch(command).await.unwrap_or_else(Reply::from)
    }

    async fn close(&mut self) {
        if let Some(login) = self.login.take() {
            self.release(login).await;
        }
    }
}
