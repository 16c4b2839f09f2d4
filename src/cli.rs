//! Command-line arguments.

use clap::Parser;

use crate::persistence::{DatabaseMode, DbDriver};

/// Lobby and matchmaking server.
#[derive(Debug, Parser)]
#[command(name = "lobby-server", version, about, long_about = None)]
pub struct Cli {
    /// Run without a database; nothing is persisted.
    #[arg(long)]
    pub nodb: bool,

    /// Database driver (`mysql` or `postgres`).
    #[arg(long, value_name = "TYPE", default_value = "mysql", conflicts_with = "nodb")]
    pub db: DbDriver,
}

impl Cli {
    /// How the database pool should be backed.
    #[must_use]
    pub const fn database_mode(&self) -> DatabaseMode {
        if self.nodb {
            DatabaseMode::Disabled
        } else {
            DatabaseMode::Driver(self.db)
        }
    }
}
