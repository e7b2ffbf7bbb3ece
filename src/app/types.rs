use std::fmt;

/// Why the watcher is shutting down
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    Signal(String),
    Error(String),
    UserRequest,
}

impl ShutdownReason {
    /// Process exit code for this reason
    pub fn exit_code(&self) -> i32 {
        match self {
            ShutdownReason::Error(_) => 1,
            ShutdownReason::Signal(_) | ShutdownReason::UserRequest => 0,
        }
    }
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownReason::Signal(name) => write!(f, "received {}", name),
            ShutdownReason::Error(message) => write!(f, "error: {}", message),
            ShutdownReason::UserRequest => f.write_str("user request"),
        }
    }
}

/// How the watcher prints notifications to stdout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}
