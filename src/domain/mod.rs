//! Domain layer: player and game records with their identifiers.

pub mod game;
pub mod game_id;
pub mod player;

pub use game::{GameEntry, GameStatus};
pub use game_id::GameId;
pub use player::{Player, PlayerId, PlayerState};
