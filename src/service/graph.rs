//! Construction of the in-process service graph.

use std::sync::Arc;

use super::matchmaker::LADDER_QUEUE_NAME;
use super::{GameRegistry, MatchmakerQueue, PlayerDirectory};
use crate::error::LobbyError;
use crate::persistence::DatabasePool;

/// The services shared by every listener.
///
/// Built exactly once, after the database pool is available. The server
/// keeps the graph behind an `Arc`; listeners and connection handlers hold
/// clones of that `Arc` and never own the services themselves.
#[derive(Debug)]
pub struct ServiceGraph {
    /// Shared database pool.
    pub db: DatabasePool,
    /// Online players.
    pub players: Arc<PlayerDirectory>,
    /// Hosted and running games.
    pub games: Arc<GameRegistry>,
    /// One-versus-one ladder queue.
    pub ladder: Arc<MatchmakerQueue>,
}

impl ServiceGraph {
    /// Builds the services in dependency order.
    ///
    /// The directory comes first, then the registry over it, then the
    /// queue over both; finally the directory gets its reference to the
    /// queue. The returned graph is fully wired.
    ///
    /// # Errors
    ///
    /// Returns [`LobbyError::Service`] if wiring fails.
    pub fn build(db: DatabasePool) -> Result<Self, LobbyError> {
        let players = Arc::new(PlayerDirectory::new(db.clone()));
        let games = Arc::new(GameRegistry::new(Arc::clone(&players)));
        let ladder = Arc::new(MatchmakerQueue::new(
            LADDER_QUEUE_NAME,
            Arc::clone(&players),
            Arc::clone(&games),
        ));
        players.attach_ladder_queue(&ladder)?;

        tracing::info!(backend = db.backend(), queue = ladder.name(), "service graph built");
        Ok(Self {
            db,
            players,
            games,
            ladder,
        })
    }

    /// Returns `true` if the directory can reach the ladder queue.
    #[must_use]
    pub fn is_wired(&self) -> bool {
        self.players
            .ladder_queue()
            .is_some_and(|queue| Arc::ptr_eq(&queue, &self.ladder))
    }
}
