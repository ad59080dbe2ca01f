//! Shared doubles for unit and behavioural tests.

mod config_loader;
mod reporter;

pub use config_loader::{FailingConfigLoader, TestConfigLoader};
pub use reporter::{HealthEvent, RecordingHealthReporter};
