mod orchestrator;
mod runtime;
mod state;
mod types;

#[cfg(test)]
mod tests;

pub use orchestrator::AuthscanOrchestrator;
pub use types::{ComponentState, LaunchOptions, ScanReport, ShutdownReason};
