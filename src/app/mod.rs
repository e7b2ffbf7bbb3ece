mod logger;
mod orchestrator;
mod runtime;
mod types;

#[cfg(test)]
mod tests;

pub use logger::AlarmLogger;
pub use orchestrator::{HikwatchApp, ShutdownHandle};
pub use types::{OutputFormat, ShutdownReason};
