//! Boot and teardown sequencing.
//!
//! # Data Flow
//! ```text
//! SignalHandlersInstalled
//!     → DatabasePool::connect        (PoolAcquired)
//!     → ServiceGraph::build          (ServicesBuilt)
//!     → server::bind_all             (ListenersBound)
//!     → BoundListeners::serve        (Running)
//!     → ShutdownCoordinator::wait
//!     → drain listeners, close pool  (ShutdownRequested → Closed)
//! ```
//!
//! A failure after the pool exists closes the pool before the error is
//! returned. A shutdown request that arrives while listeners are binding
//! does not interrupt the binds: they complete, the server enters
//! `Running` with every task already cancelled, and teardown follows at
//! once.

use std::sync::Arc;
use std::time::Duration;

use super::{Phase, PhaseTracker, ShutdownCoordinator, ShutdownReason};
use crate::config::ServerConfig;
use crate::error::LobbyError;
use crate::persistence::{DatabaseMode, DatabasePool};
use crate::server::{self, ListenerAddrs, ListenerSet, RunningListeners};
use crate::service::ServiceGraph;

/// Owns everything needed to bring the server up.
#[derive(Debug)]
pub struct Orchestrator {
    config: ServerConfig,
    mode: DatabaseMode,
    phases: Arc<PhaseTracker>,
    shutdown: ShutdownCoordinator,
}

impl Orchestrator {
    /// Creates an orchestrator. `phases` must already be at
    /// [`Phase::SignalHandlersInstalled`] when [`Orchestrator::start`] runs.
    #[must_use]
    pub const fn new(
        config: ServerConfig,
        mode: DatabaseMode,
        phases: Arc<PhaseTracker>,
        shutdown: ShutdownCoordinator,
    ) -> Self {
        Self {
            config,
            mode,
            phases,
            shutdown,
        }
    }

    /// Acquires the pool, builds the services and starts every listener.
    ///
    /// # Errors
    ///
    /// Returns the first boot failure: [`LobbyError::Database`] or
    /// [`LobbyError::Config`] from the pool, [`LobbyError::Service`] from
    /// wiring or an out-of-order phase, [`LobbyError::Bind`] from a
    /// listener. Nothing is left running when this fails.
    pub async fn start(self) -> Result<RunningServer, LobbyError> {
        let db = DatabasePool::connect(&self.config.database, self.mode).await?;
        match self.start_with_pool(&db).await {
            Ok(running) => Ok(running),
            Err(e) => {
                tracing::error!(error = %e, "startup failed; releasing database pool");
                db.close().await;
                Err(e)
            }
        }
    }

    async fn start_with_pool(self, db: &DatabasePool) -> Result<RunningServer, LobbyError> {
        self.phases.advance(Phase::PoolAcquired)?;

        let services = Arc::new(ServiceGraph::build(db.clone())?);
        self.phases.advance(Phase::ServicesBuilt)?;

        let set = ListenerSet::from_config(&self.config);
        let bound = server::bind_all(&set).await?;
        self.phases.advance(Phase::ListenersBound)?;

        if self.shutdown.is_requested() {
            tracing::info!("shutdown requested during startup; listeners will close immediately");
        }

        let listeners = bound.serve(&services, &self.shutdown.child_token())?;
        self.phases.advance(Phase::Running)?;

        let addrs = listeners.addrs();
        tracing::info!(
            control = %addrs.control,
            lobby = %addrs.lobby,
            game_tcp = %addrs.game_tcp,
            game_udp = %addrs.game_udp,
            database = db.backend(),
            "server running"
        );

        Ok(RunningServer {
            services,
            listeners,
            phases: self.phases,
            shutdown: self.shutdown,
            grace: self.config.shutdown_grace,
        })
    }

    /// Starts the server, blocks until shutdown is requested, then tears
    /// everything down.
    ///
    /// # Errors
    ///
    /// Returns any error from [`Orchestrator::start`] or
    /// [`RunningServer::close`].
    pub async fn run(self) -> Result<ShutdownReason, LobbyError> {
        let server = self.start().await?;
        let reason = server.wait().await;
        server.close().await?;
        Ok(reason)
    }
}

/// A server in the [`Phase::Running`] phase.
#[derive(Debug)]
pub struct RunningServer {
    services: Arc<ServiceGraph>,
    listeners: RunningListeners,
    phases: Arc<PhaseTracker>,
    shutdown: ShutdownCoordinator,
    grace: Duration,
}

impl RunningServer {
    /// Local addresses of the listeners.
    #[must_use]
    pub const fn addrs(&self) -> ListenerAddrs {
        self.listeners.addrs()
    }

    /// The shared service graph.
    #[must_use]
    pub const fn services(&self) -> &Arc<ServiceGraph> {
        &self.services
    }

    /// The coordinator this server stops on.
    #[must_use]
    pub const fn shutdown_handle(&self) -> &ShutdownCoordinator {
        &self.shutdown
    }

    /// Blocks until shutdown is requested.
    pub async fn wait(&self) -> ShutdownReason {
        self.shutdown.wait().await
    }

    /// Tears the server down: listeners stop, connections drain for up to
    /// the configured grace period, then the pool is closed.
    ///
    /// Resolves the shutdown signal first if nobody else has.
    ///
    /// # Errors
    ///
    /// Returns [`LobbyError::Service`] if the lifecycle is not in
    /// [`Phase::Running`]. Listeners and the pool are released even then.
    pub async fn close(self) -> Result<(), LobbyError> {
        self.shutdown.request(ShutdownReason::Requested);
        let requested = self.phases.advance(Phase::ShutdownRequested);
        if let Err(e) = &requested {
            tracing::error!(error = %e, "lifecycle out of order at shutdown; tearing down anyway");
        }

        let abandoned = self.listeners.shutdown(self.grace).await;
        if abandoned > 0 {
            tracing::warn!(abandoned, "connections abandoned at shutdown");
        }
        self.services.db.close().await;

        requested?;
        self.phases.advance(Phase::Closed)
    }
}
