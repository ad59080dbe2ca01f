//! Process wiring: termination signals and the launch sequence.

mod errors;
mod launch;
mod shutdown;

pub use errors::LaunchError;
pub use launch::{LaunchPlan, run_daemon, run_daemon_with};
#[cfg(test)]
pub use shutdown::MockShutdownSignal;
pub use shutdown::{ShutdownError, ShutdownSignal, SystemShutdownSignal};

pub(crate) const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");
