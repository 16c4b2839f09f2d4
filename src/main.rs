//! lobby-server entry point.
//!
//! Initialises logging and signal handling, then hands over to the
//! orchestrator. Any boot failure is logged with its full cause chain and
//! the process exits non-zero.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use lobby_server::cli::Cli;
use lobby_server::config::{LogSettings, ServerConfig};
use lobby_server::lifecycle::{
    Orchestrator, Phase, PhaseTracker, ShutdownCoordinator, ShutdownReason,
};
use lobby_server::logging;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_settings = LogSettings::from_env();
    if let Err(e) = logging::init(&log_settings) {
        eprintln!("failed to initialise logging: {e}");
        return ExitCode::FAILURE;
    }

    match run(&cli).await {
        Ok(reason) => {
            tracing::info!(%reason, "server stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = ?e, "failure booting server");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> anyhow::Result<ShutdownReason> {
    let phases = Arc::new(PhaseTracker::new());
    phases.advance(Phase::LoggingReady)?;

    let shutdown = ShutdownCoordinator::new();
    // Handlers stay installed until teardown completes.
    let _signals = shutdown
        .install_signal_handlers()
        .context("installing signal handlers")?;
    phases.advance(Phase::SignalHandlersInstalled)?;

    let config = ServerConfig::from_env().context("loading configuration")?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        database = ?cli.database_mode(),
        "starting lobby-server"
    );

    Orchestrator::new(config, cli.database_mode(), phases, shutdown)
        .run()
        .await
        .context("running server")
}
