//! Server configuration loaded from environment variables.
//!
//! All settings come from environment variables (or a `.env` file via
//! `dotenvy`). Logging settings are split out into [`LogSettings`] so the
//! subscriber can be installed before the rest of the configuration is
//! validated; that way a bad value is reported through the log file.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::LobbyError;

/// Default client-facing lobby address.
pub const DEFAULT_LOBBY_ADDR: &str = "0.0.0.0:8001";
/// Default game traffic address (shared by the UDP and TCP listeners).
pub const DEFAULT_GAME_ADDR: &str = "0.0.0.0:8000";
/// Default control-plane address.
pub const DEFAULT_CONTROL_ADDR: &str = "127.0.0.1:4000";

/// Connection parameters for the shared database pool.
#[derive(Clone)]
pub struct DatabaseSettings {
    /// Database host name or address.
    pub host: String,
    /// Explicit port; `None` uses the selected driver's default.
    pub port: Option<u16>,
    /// Login user.
    pub user: String,
    /// Login password.
    pub password: String,
    /// Target database name.
    pub database: String,
    /// Upper bound of pooled connections. Always greater than zero.
    pub max_connections: u32,
    /// How long acquiring the initial connection may take.
    pub connect_timeout: Duration,
}

impl fmt::Debug for DatabaseSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("max_connections", &self.max_connections)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

/// Top-level server configuration.
///
/// Loaded once at startup via [`ServerConfig::from_env`].
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Database pool parameters.
    pub database: DatabaseSettings,
    /// Bind address of the administrative HTTP server.
    pub control_addr: SocketAddr,
    /// Bind address of the lobby TCP server.
    pub lobby_addr: SocketAddr,
    /// Bind address shared by the game UDP and TCP listeners.
    pub game_addr: SocketAddr,
    /// How long teardown waits for open connections to drain.
    pub shutdown_grace: Duration,
}

impl ServerConfig {
    /// Loads configuration from the process environment.
    ///
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns [`LobbyError::Config`] if a variable is set but invalid, or
    /// if the resulting configuration fails validation.
    pub fn from_env() -> Result<Self, LobbyError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary key lookup.
    ///
    /// Unset keys fall back to defaults; set keys must parse.
    ///
    /// # Errors
    ///
    /// Returns [`LobbyError::Config`] on unparsable values, a zero pool
    /// size, or clashing listener addresses.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, LobbyError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = match lookup("DB_PORT") {
            Some(raw) => Some(parse_value::<u16>("DB_PORT", &raw)?),
            None => None,
        };

        let database = DatabaseSettings {
            host: lookup("DB_SERVER").unwrap_or_else(|| "127.0.0.1".to_string()),
            port,
            user: lookup("DB_LOGIN").unwrap_or_else(|| "root".to_string()),
            password: lookup("DB_PASSWORD").unwrap_or_default(),
            database: lookup("DB_NAME").unwrap_or_else(|| "faf_lobby".to_string()),
            max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 10)?,
            connect_timeout: Duration::from_secs(parse_or(&lookup, "DB_CONNECT_TIMEOUT_SECS", 5)?),
        };

        let config = Self {
            database,
            control_addr: parse_or_str(&lookup, "CONTROL_ADDR", DEFAULT_CONTROL_ADDR)?,
            lobby_addr: parse_or_str(&lookup, "LOBBY_ADDR", DEFAULT_LOBBY_ADDR)?,
            game_addr: parse_or_str(&lookup, "GAME_ADDR", DEFAULT_GAME_ADDR)?,
            shutdown_grace: Duration::from_secs(parse_or(&lookup, "SHUTDOWN_GRACE_SECS", 5)?),
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks semantic constraints that parsing alone cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`LobbyError::Config`] describing the first violation.
    pub fn validate(&self) -> Result<(), LobbyError> {
        if self.database.max_connections == 0 {
            return Err(LobbyError::Config(
                "DB_MAX_CONNECTIONS must be greater than zero".to_string(),
            ));
        }
        if self.database.port == Some(0) {
            return Err(LobbyError::Config("DB_PORT must not be zero".to_string()));
        }

        // Port 0 asks the OS for an ephemeral port, so those never clash.
        let named = [
            ("CONTROL_ADDR", self.control_addr),
            ("LOBBY_ADDR", self.lobby_addr),
            ("GAME_ADDR", self.game_addr),
        ];
        for (i, (key_a, addr_a)) in named.iter().enumerate() {
            for (key_b, addr_b) in named.iter().skip(i + 1) {
                if addr_a.port() != 0 && addr_a == addr_b {
                    return Err(LobbyError::Config(format!(
                        "{key_a} and {key_b} must differ (both {addr_a})"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Log sink settings, resolved before anything else.
#[derive(Debug, Clone)]
pub struct LogSettings {
    /// Directory receiving `server.log` and its rotated backups.
    pub dir: PathBuf,
    /// Default verbosity, in `EnvFilter` directive syntax.
    pub level: String,
}

impl LogSettings {
    /// Reads `LOG_PATH` and `LOG_LEVEL` from the environment.
    #[must_use]
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds log settings from an arbitrary key lookup. Never fails.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            dir: lookup("LOG_PATH").map_or_else(|| PathBuf::from("logs"), PathBuf::from),
            level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        }
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, LobbyError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| LobbyError::Config(format!("{key}={raw:?} is invalid: {e}")))
}

/// Parses `key` as `T`, returning `default` when unset and an error when
/// set to something unparsable.
fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> Result<T, LobbyError>
where
    T: FromStr,
    T::Err: fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    lookup(key).map_or(Ok(default), |raw| parse_value(key, &raw))
}

fn parse_or_str<T, F>(lookup: &F, key: &str, default: &str) -> Result<T, LobbyError>
where
    T: FromStr,
    T::Err: fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key).unwrap_or_else(|| default.to_string());
    parse_value(key, &raw)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let Ok(config) = ServerConfig::from_lookup(lookup_from(&[])) else {
            panic!("defaults should be valid");
        };
        assert_eq!(config.lobby_addr.port(), 8001);
        assert_eq!(config.game_addr.port(), 8000);
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.database.port, None);
    }

    #[test]
    fn non_numeric_port_is_config_error() {
        let result = ServerConfig::from_lookup(lookup_from(&[("DB_PORT", "mysql")]));
        assert!(matches!(result, Err(LobbyError::Config(_))));
    }

    #[test]
    fn numeric_port_is_parsed() {
        let Ok(config) = ServerConfig::from_lookup(lookup_from(&[("DB_PORT", "3307")])) else {
            panic!("valid port");
        };
        assert_eq!(config.database.port, Some(3307));
    }

    #[test]
    fn zero_pool_size_is_rejected() {
        let result = ServerConfig::from_lookup(lookup_from(&[("DB_MAX_CONNECTIONS", "0")]));
        assert!(matches!(result, Err(LobbyError::Config(_))));
    }

    #[test]
    fn clashing_listener_addresses_are_rejected() {
        let result = ServerConfig::from_lookup(lookup_from(&[
            ("LOBBY_ADDR", "127.0.0.1:9000"),
            ("GAME_ADDR", "127.0.0.1:9000"),
        ]));
        assert!(matches!(result, Err(LobbyError::Config(_))));
    }

    #[test]
    fn ephemeral_ports_may_repeat() {
        let result = ServerConfig::from_lookup(lookup_from(&[
            ("CONTROL_ADDR", "127.0.0.1:0"),
            ("LOBBY_ADDR", "127.0.0.1:0"),
            ("GAME_ADDR", "127.0.0.1:0"),
        ]));
        assert!(result.is_ok());
    }

    #[test]
    fn password_is_not_printed() {
        let Ok(config) = ServerConfig::from_lookup(lookup_from(&[("DB_PASSWORD", "hunter2")]))
        else {
            panic!("valid config");
        };
        let debug = format!("{:?}", config.database);
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn log_settings_defaults() {
        let settings = LogSettings::from_lookup(lookup_from(&[("LOG_LEVEL", "debug")]));
        assert_eq!(settings.dir, PathBuf::from("logs"));
        assert_eq!(settings.level, "debug");
    }
}
