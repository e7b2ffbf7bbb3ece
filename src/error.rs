use thiserror::Error;

#[derive(Error, Debug)]
pub enum HikwatchError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::DeError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Invalid argument: {message}")]
    Validation { message: String },

    #[error("Command failed: {message}")]
    Command { message: String },

    #[error("Alarm stream error: {message}")]
    Stream { message: String },

    #[error("System error: {message}")]
    System { message: String },
}

impl HikwatchError {
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn command<S: Into<String>>(message: S) -> Self {
        Self::Command {
            message: message.into(),
        }
    }

    pub fn stream<S: Into<String>>(message: S) -> Self {
        Self::Stream {
            message: message.into(),
        }
    }

    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }
}

/// Errors raised by the notification bus
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventBusError {
    #[error("Failed to publish event: {details}")]
    PublishFailed { details: String },

    #[error("Receiver lagged behind by {skipped} events")]
    Lagged { skipped: u64 },

    #[error("Event channel closed")]
    ChannelClosed,
}

pub type Result<T> = std::result::Result<T, HikwatchError>;
