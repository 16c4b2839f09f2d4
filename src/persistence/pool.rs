//! Shared database pool handle.
//!
//! [`DatabasePool`] is the first resource the server acquires. Every
//! service holds a clone; all clones share the same underlying connections.

use std::fmt;
use std::str::FromStr;

use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};

use super::mock::MockPool;
use crate::config::DatabaseSettings;
use crate::error::LobbyError;

/// SQL driver used for the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DbDriver {
    /// MySQL / MariaDB.
    #[default]
    MySql,
    /// PostgreSQL.
    Postgres,
}

impl DbDriver {
    /// Port the driver listens on when none is configured.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::MySql => 3306,
            Self::Postgres => 5432,
        }
    }
}

impl fmt::Display for DbDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MySql => f.write_str("mysql"),
            Self::Postgres => f.write_str("postgres"),
        }
    }
}

impl FromStr for DbDriver {
    type Err = String;

    /// Accepts the plain driver names and the legacy Qt-style aliases
    /// (`QMYSQL`, `QPSQL`), case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mysql" | "qmysql" | "mariadb" => Ok(Self::MySql),
            "postgres" | "postgresql" | "qpsql" => Ok(Self::Postgres),
            other => Err(format!("unsupported database driver: {other}")),
        }
    }
}

/// How the pool is backed: a real driver or the no-database stand-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseMode {
    /// Connect to a real database with the given driver.
    Driver(DbDriver),
    /// Use [`MockPool`]; nothing is persisted.
    Disabled,
}

impl Default for DatabaseMode {
    fn default() -> Self {
        Self::Driver(DbDriver::default())
    }
}

/// Shared, bounded connection pool.
///
/// Cloning is cheap; every clone refers to the same pool. The server owns
/// the original and closes it during teardown.
#[derive(Debug, Clone)]
pub enum DatabasePool {
    /// MySQL-backed pool.
    MySql(MySqlPool),
    /// PostgreSQL-backed pool.
    Postgres(PgPool),
    /// Stand-in used when the server runs without a database.
    Mock(MockPool),
}

impl DatabasePool {
    /// Establishes the pool and waits until the first connection succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`LobbyError::Database`] if the backend is unreachable,
    /// rejects the credentials, or does not answer within
    /// `settings.connect_timeout`. Returns [`LobbyError::Config`] if the
    /// pool size is zero.
    pub async fn connect(settings: &DatabaseSettings, mode: DatabaseMode) -> Result<Self, LobbyError> {
        if settings.max_connections == 0 {
            return Err(LobbyError::Config(
                "database pool size must be greater than zero".to_string(),
            ));
        }

        let driver = match mode {
            DatabaseMode::Disabled => {
                tracing::warn!("running without a database; nothing will be persisted");
                return Ok(Self::Mock(MockPool::new(settings.max_connections)));
            }
            DatabaseMode::Driver(driver) => driver,
        };

        let port = settings.port.unwrap_or_else(|| driver.default_port());
        tracing::info!(
            %driver,
            host = %settings.host,
            port,
            database = %settings.database,
            max_connections = settings.max_connections,
            "connecting to database"
        );

        let pool = match driver {
            DbDriver::MySql => {
                let options = MySqlConnectOptions::new()
                    .host(&settings.host)
                    .port(port)
                    .username(&settings.user)
                    .password(&settings.password)
                    .database(&settings.database);
                let pool = MySqlPoolOptions::new()
                    .max_connections(settings.max_connections)
                    .acquire_timeout(settings.connect_timeout)
                    .connect_with(options)
                    .await?;
                Self::MySql(pool)
            }
            DbDriver::Postgres => {
                let options = PgConnectOptions::new()
                    .host(&settings.host)
                    .port(port)
                    .username(&settings.user)
                    .password(&settings.password)
                    .database(&settings.database);
                let pool = PgPoolOptions::new()
                    .max_connections(settings.max_connections)
                    .acquire_timeout(settings.connect_timeout)
                    .connect_with(options)
                    .await?;
                Self::Postgres(pool)
            }
        };

        tracing::info!(%driver, "database pool ready");
        Ok(pool)
    }

    /// Short name of the backend, for logs and health output.
    #[must_use]
    pub const fn backend(&self) -> &'static str {
        match self {
            Self::MySql(_) => "mysql",
            Self::Postgres(_) => "postgres",
            Self::Mock(_) => "mock",
        }
    }

    /// Number of connections currently open (idle or in use).
    #[must_use]
    pub fn size(&self) -> u32 {
        match self {
            Self::MySql(pool) => pool.size(),
            Self::Postgres(pool) => pool.size(),
            Self::Mock(pool) => pool.size(),
        }
    }

    /// Returns `true` once [`DatabasePool::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        match self {
            Self::MySql(pool) => pool.is_closed(),
            Self::Postgres(pool) => pool.is_closed(),
            Self::Mock(pool) => pool.is_closed(),
        }
    }

    /// Runs a trivial round-trip query.
    ///
    /// # Errors
    ///
    /// Returns [`LobbyError::Database`] if the query fails or the pool is
    /// closed.
    pub async fn ping(&self) -> Result<(), LobbyError> {
        match self {
            Self::MySql(pool) => {
                sqlx::query("SELECT 1").execute(pool).await?;
            }
            Self::Postgres(pool) => {
                sqlx::query("SELECT 1").execute(pool).await?;
            }
            Self::Mock(pool) => pool.ping()?,
        }
        Ok(())
    }

    /// Closes every connection and waits for in-use ones to be returned.
    ///
    /// Idempotent: closing an already closed pool returns immediately.
    pub async fn close(&self) {
        match self {
            Self::MySql(pool) => pool.close().await,
            Self::Postgres(pool) => pool.close().await,
            Self::Mock(pool) => pool.close(),
        }
        tracing::info!(backend = self.backend(), "database pool closed");
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn settings(port: u16) -> DatabaseSettings {
        DatabaseSettings {
            host: "127.0.0.1".to_string(),
            port: Some(port),
            user: "lobby".to_string(),
            password: "lobby".to_string(),
            database: "lobby".to_string(),
            max_connections: 2,
            connect_timeout: Duration::from_secs(2),
        }
    }

    #[test]
    fn driver_names_parse() {
        assert_eq!("QMYSQL".parse::<DbDriver>(), Ok(DbDriver::MySql));
        assert_eq!("postgres".parse::<DbDriver>(), Ok(DbDriver::Postgres));
        assert!("oracle".parse::<DbDriver>().is_err());
    }

    #[tokio::test]
    async fn disabled_mode_yields_mock_pool() {
        let Ok(pool) = DatabasePool::connect(&settings(1), DatabaseMode::Disabled).await else {
            panic!("mock pool never fails");
        };
        assert_eq!(pool.backend(), "mock");
        assert!(pool.ping().await.is_ok());
        pool.close().await;
        assert!(pool.is_closed());
        assert!(pool.ping().await.is_err());
    }

    #[tokio::test]
    async fn unreachable_host_fails_fast() {
        // Nothing listens on port 1 of the loopback interface.
        let result =
            DatabasePool::connect(&settings(1), DatabaseMode::Driver(DbDriver::MySql)).await;
        assert!(matches!(result, Err(LobbyError::Database(_))));
    }

    #[tokio::test]
    async fn zero_pool_size_is_rejected() {
        let mut bad = settings(1);
        bad.max_connections = 0;
        let result = DatabasePool::connect(&bad, DatabaseMode::Disabled).await;
        assert!(matches!(result, Err(LobbyError::Config(_))));
    }
}
