//! Shutdown coordination.
//!
//! [`ShutdownCoordinator`] owns the single completion value the main flow
//! blocks on. It resolves at most once; later requests (a second Ctrl-C, a
//! SIGTERM after a SIGINT) are logged and ignored. Every long-running task
//! receives a child of its cancellation token.

use std::fmt;
use std::sync::{Arc, OnceLock};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::LobbyError;

/// Why shutdown was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// SIGINT / Ctrl-C.
    Interrupt,
    /// SIGTERM.
    Terminate,
    /// Requested programmatically (tests, failed startup).
    Requested,
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interrupt => f.write_str("SIGINT"),
            Self::Terminate => f.write_str("SIGTERM"),
            Self::Requested => f.write_str("request"),
        }
    }
}

/// Single-resolution shutdown signal.
///
/// Cloning is cheap; all clones observe the same resolution.
#[derive(Debug, Clone, Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
    reason: Arc<OnceLock<ShutdownReason>>,
}

impl ShutdownCoordinator {
    /// Creates an unresolved coordinator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves the signal. Returns `true` only for the call that actually
    /// resolved it; every later call is a no-op returning `false`.
    pub fn request(&self, reason: ShutdownReason) -> bool {
        if self.reason.set(reason).is_ok() {
            tracing::info!(%reason, "received shutdown request, shutting down");
            self.token.cancel();
            true
        } else {
            tracing::debug!(%reason, "shutdown already requested; ignoring");
            false
        }
    }

    /// Returns `true` once the signal has resolved.
    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.reason.get().is_some()
    }

    /// The resolving reason, if resolved.
    #[must_use]
    pub fn reason(&self) -> Option<ShutdownReason> {
        self.reason.get().copied()
    }

    /// Token cancelled when the signal resolves. Child tokens can also be
    /// cancelled on their own without affecting the coordinator.
    #[must_use]
    pub fn child_token(&self) -> CancellationToken {
        self.token.child_token()
    }

    /// Waits until the signal resolves and returns why.
    pub async fn wait(&self) -> ShutdownReason {
        self.token.cancelled().await;
        self.reason().unwrap_or(ShutdownReason::Requested)
    }

    /// Routes SIGINT and SIGTERM (Ctrl-C elsewhere) into
    /// [`ShutdownCoordinator::request`].
    ///
    /// The handlers stay installed until the returned guard is dropped, so
    /// repeated signals keep landing on the idempotent path instead of
    /// killing the process.
    ///
    /// # Errors
    ///
    /// Returns [`LobbyError::Signal`] if a handler cannot be registered.
    pub fn install_signal_handlers(&self) -> Result<SignalHandlers, LobbyError> {
        let handle = spawn_signal_task(self.clone())?;
        tracing::debug!("termination signal handlers installed");
        Ok(SignalHandlers { handle })
    }
}

#[cfg(unix)]
fn spawn_signal_task(coordinator: ShutdownCoordinator) -> Result<JoinHandle<()>, LobbyError> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt()).map_err(LobbyError::Signal)?;
    let mut sigterm = signal(SignalKind::terminate()).map_err(LobbyError::Signal)?;

    Ok(tokio::spawn(async move {
        loop {
            let reason = tokio::select! {
                received = sigint.recv() => match received {
                    Some(()) => ShutdownReason::Interrupt,
                    None => break,
                },
                received = sigterm.recv() => match received {
                    Some(()) => ShutdownReason::Terminate,
                    None => break,
                },
            };
            coordinator.request(reason);
        }
    }))
}

#[cfg(not(unix))]
fn spawn_signal_task(coordinator: ShutdownCoordinator) -> Result<JoinHandle<()>, LobbyError> {
    Ok(tokio::spawn(async move {
        loop {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "ctrl-c handler failed");
                break;
            }
            coordinator.request(ShutdownReason::Interrupt);
        }
    }))
}

/// Guard keeping the signal handlers alive; aborts them on drop.
#[derive(Debug)]
pub struct SignalHandlers {
    handle: JoinHandle<()>,
}

impl Drop for SignalHandlers {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
