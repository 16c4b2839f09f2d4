//! Process lifecycle: phase tracking, shutdown coordination and the
//! boot/teardown sequence.

pub mod orchestrator;
pub mod phase;
pub mod shutdown;

pub use orchestrator::{Orchestrator, RunningServer};
pub use phase::{Phase, PhaseTracker};
pub use shutdown::{ShutdownCoordinator, ShutdownReason, SignalHandlers};
