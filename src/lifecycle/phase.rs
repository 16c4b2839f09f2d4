//! Process lifecycle phases.
//!
//! The server moves through [`Phase`] strictly in declaration order.
//! [`PhaseTracker`] enforces that order, publishes the current phase on a
//! watch channel and records the history for diagnostics.

use std::fmt;
use std::sync::{Mutex, PoisonError};

use tokio::sync::watch;

use crate::error::LobbyError;

/// A step of the boot / run / teardown sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    /// Nothing initialised yet.
    Unstarted,
    /// Log subscriber installed.
    LoggingReady,
    /// Termination signal handlers installed.
    SignalHandlersInstalled,
    /// Database pool acquired.
    PoolAcquired,
    /// Service graph built and wired.
    ServicesBuilt,
    /// All listeners bound.
    ListenersBound,
    /// Listeners accepting traffic.
    Running,
    /// Shutdown signal resolved; teardown in progress.
    ShutdownRequested,
    /// Listeners and pool released.
    Closed,
}

impl Phase {
    /// The only phase allowed to follow this one.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Unstarted => Some(Self::LoggingReady),
            Self::LoggingReady => Some(Self::SignalHandlersInstalled),
            Self::SignalHandlersInstalled => Some(Self::PoolAcquired),
            Self::PoolAcquired => Some(Self::ServicesBuilt),
            Self::ServicesBuilt => Some(Self::ListenersBound),
            Self::ListenersBound => Some(Self::Running),
            Self::Running => Some(Self::ShutdownRequested),
            Self::ShutdownRequested => Some(Self::Closed),
            Self::Closed => None,
        }
    }

    /// Snake-case name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unstarted => "unstarted",
            Self::LoggingReady => "logging_ready",
            Self::SignalHandlersInstalled => "signal_handlers_installed",
            Self::PoolAcquired => "pool_acquired",
            Self::ServicesBuilt => "services_built",
            Self::ListenersBound => "listeners_bound",
            Self::Running => "running",
            Self::ShutdownRequested => "shutdown_requested",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Enforces and publishes lifecycle transitions.
#[derive(Debug)]
pub struct PhaseTracker {
    current: watch::Sender<Phase>,
    history: Mutex<Vec<Phase>>,
}

impl PhaseTracker {
    /// Creates a tracker in [`Phase::Unstarted`].
    #[must_use]
    pub fn new() -> Self {
        let (current, _) = watch::channel(Phase::Unstarted);
        Self {
            current,
            history: Mutex::new(vec![Phase::Unstarted]),
        }
    }

    /// Current phase.
    #[must_use]
    pub fn current(&self) -> Phase {
        *self.current.borrow()
    }

    /// Receiver notified on every transition.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Phase> {
        self.current.subscribe()
    }

    /// Every phase entered so far, in order.
    #[must_use]
    pub fn history(&self) -> Vec<Phase> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Moves to `next`, which must directly follow the current phase.
    ///
    /// # Errors
    ///
    /// Returns [`LobbyError::Service`] for a skipped or repeated phase.
    pub fn advance(&self, next: Phase) -> Result<(), LobbyError> {
        let current = self.current();
        if current.next() != Some(next) {
            return Err(LobbyError::Service(format!(
                "illegal lifecycle transition {current} -> {next}"
            )));
        }
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(next);
        self.current.send_replace(next);
        tracing::info!(phase = %next, "lifecycle phase");
        Ok(())
    }
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walks_the_full_sequence() {
        let tracker = PhaseTracker::new();
        let mut phase = Phase::Unstarted;
        while let Some(next) = phase.next() {
            assert!(tracker.advance(next).is_ok());
            phase = next;
        }
        assert_eq!(tracker.current(), Phase::Closed);
        assert_eq!(tracker.history().len(), 9);
    }

    #[test]
    fn skipping_a_phase_is_rejected() {
        let tracker = PhaseTracker::new();
        let result = tracker.advance(Phase::PoolAcquired);
        assert!(matches!(result, Err(LobbyError::Service(_))));
        assert_eq!(tracker.current(), Phase::Unstarted);
    }

    #[test]
    fn repeating_a_phase_is_rejected() {
        let tracker = PhaseTracker::new();
        assert!(tracker.advance(Phase::LoggingReady).is_ok());
        assert!(tracker.advance(Phase::LoggingReady).is_err());
    }

    #[tokio::test]
    async fn subscribers_observe_transitions() {
        let tracker = PhaseTracker::new();
        let mut rx = tracker.subscribe();
        assert!(tracker.advance(Phase::LoggingReady).is_ok());
        assert!(rx.changed().await.is_ok());
        assert_eq!(*rx.borrow(), Phase::LoggingReady);
    }
}
