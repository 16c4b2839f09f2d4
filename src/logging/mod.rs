//! Tracing subscriber setup.
//!
//! Installs a registry with an `EnvFilter`, a human-readable stderr layer
//! and a plain-text layer writing to a size-rotated `server.log`. Must run
//! before any other subsystem so boot failures reach the log file.

pub mod rotation;

use std::sync::Mutex;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub use rotation::RotatingFile;

use crate::config::LogSettings;
use crate::error::LobbyError;

/// Name of the live log file inside the log directory.
pub const LOG_FILE_NAME: &str = "server.log";
/// Size at which the log file is rotated (16 MiB).
pub const MAX_LOG_BYTES: u64 = 16 * 1024 * 1024;
/// Number of rotated backups kept.
pub const MAX_LOG_BACKUPS: usize = 1024;

/// Installs the global subscriber.
///
/// `RUST_LOG` takes precedence over `settings.level` when set.
///
/// # Errors
///
/// Returns [`LobbyError::Io`] if the log file cannot be opened,
/// [`LobbyError::Config`] if the level is not a valid filter, and
/// [`LobbyError::Internal`] if a global subscriber is already installed.
pub fn init(settings: &LogSettings) -> Result<(), LobbyError> {
    let file = RotatingFile::open(&settings.dir, LOG_FILE_NAME, MAX_LOG_BYTES, MAX_LOG_BACKUPS)?;

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(normalize_level(&settings.level)).map_err(|e| {
            LobbyError::Config(format!("LOG_LEVEL={:?} is invalid: {e}", settings.level))
        })?,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .try_init()
        .map_err(|e| LobbyError::Internal(format!("logging already initialised: {e}")))?;

    tracing::debug!(dir = %settings.dir.display(), "logging ready");
    Ok(())
}

/// Maps level names used by other logging ecosystems (`WARNING`,
/// `CRITICAL`, numeric levels) onto `tracing` directives.
#[must_use]
pub fn normalize_level(level: &str) -> String {
    match level.trim().to_ascii_lowercase().as_str() {
        "warning" | "30" => "warn".to_string(),
        "critical" | "fatal" | "40" | "50" => "error".to_string(),
        "20" => "info".to_string(),
        "10" => "debug".to_string(),
        "notset" | "0" => "trace".to_string(),
        other => other.to_string(),
    }
}
