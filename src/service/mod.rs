//! Service layer: the in-process services shared by all listeners.
//!
//! [`ServiceGraph::build`] constructs [`PlayerDirectory`],
//! [`GameRegistry`] and [`MatchmakerQueue`] in dependency order and wires
//! the directory's back-reference to the queue.

pub mod game_registry;
pub mod graph;
pub mod matchmaker;
pub mod player_directory;

pub use game_registry::GameRegistry;
pub use graph::ServiceGraph;
pub use matchmaker::{MatchmakerQueue, QueueSummary, Search};
pub use player_directory::PlayerDirectory;
