//! Subprocess supervision: spawning, per-line watchdog, guarded execution.

mod executor;
mod runner;
mod watchdog;

pub use executor::{CommandExecutor, ExecOutput};
pub use runner::ProcessHandle;
pub use watchdog::{LineEvent, WatchdogReader};
