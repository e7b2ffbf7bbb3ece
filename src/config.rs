use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Longest accepted reconnect delay (one day)
pub const MAX_RECONNECT_DELAY_SECS: u64 = 86_400;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HikwatchConfig {
    pub camera: CameraConfig,
    pub session: SessionConfig,
    pub alarm: AlarmConfig,
    pub command: CommandConfig,
    pub system: SystemConfig,
}

/// Connection parameters for a single device
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CameraConfig {
    /// Device hostname or IP address
    #[serde(default)]
    pub host: String,

    /// HTTP port of the device
    #[serde(default = "default_camera_port")]
    pub port: u16,

    /// Account used for Basic authentication
    #[serde(default = "default_camera_username")]
    pub username: String,

    #[serde(default)]
    pub password: String,

    /// Verbose diagnostics (debug bus logging, heartbeat alarms)
    #[serde(default)]
    pub log: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SessionConfig {
    /// Delay before reconnecting after the alarm stream closes
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,

    /// Double the reconnect delay after each failed attempt
    #[serde(default)]
    pub exponential_backoff: bool,

    /// Upper bound for the reconnect delay when backoff is enabled
    #[serde(default = "default_max_reconnect_delay_secs")]
    pub max_reconnect_delay_secs: u64,

    /// TCP connect timeout
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Idle time before the first keep-alive probe
    #[serde(default = "default_keepalive_idle_ms")]
    pub keepalive_idle_ms: u64,

    /// Interval between keep-alive probes
    #[serde(default = "default_keepalive_interval_secs")]
    pub keepalive_interval_secs: u64,

    /// Unanswered probes before the peer is considered dead
    #[serde(default = "default_keepalive_retries")]
    pub keepalive_retries: u32,

    /// Largest alarm document buffered while waiting for its end tag
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AlarmConfig {
    /// Silence after which an active alarm is considered stopped
    #[serde(default = "default_stale_after_ms")]
    pub stale_after_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CommandConfig {
    /// Timeout for a single control request
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SystemConfig {
    /// Event bus capacity
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,
}

impl HikwatchConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("hikwatch.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("camera.host", "")?
            .set_default("camera.port", default_camera_port() as i64)?
            .set_default("camera.username", default_camera_username())?
            .set_default("camera.password", "")?
            .set_default("camera.log", false)?
            .set_default(
                "session.reconnect_delay_secs",
                default_reconnect_delay_secs(),
            )?
            .set_default("session.exponential_backoff", false)?
            .set_default(
                "session.max_reconnect_delay_secs",
                default_max_reconnect_delay_secs(),
            )?
            .set_default(
                "session.connect_timeout_secs",
                default_connect_timeout_secs(),
            )?
            .set_default("session.keepalive_idle_ms", default_keepalive_idle_ms())?
            .set_default(
                "session.keepalive_interval_secs",
                default_keepalive_interval_secs(),
            )?
            .set_default("session.keepalive_retries", default_keepalive_retries())?
            .set_default(
                "session.max_frame_bytes",
                default_max_frame_bytes() as i64,
            )?
            .set_default("alarm.stale_after_ms", default_stale_after_ms())?
            .set_default(
                "command.request_timeout_secs",
                default_request_timeout_secs(),
            )?
            .set_default(
                "system.event_bus_capacity",
                default_event_bus_capacity() as i64,
            )?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // HIKWATCH_CAMERA__HOST, HIKWATCH_SESSION__RECONNECT_DELAY_SECS, ...
            .add_source(
                Environment::with_prefix("HIKWATCH")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: HikwatchConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!(
            "Final configuration: {:#?}",
            config.redacted()
        );

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.camera.host.trim().is_empty() {
            return Err(ConfigError::Message(
                "Camera host must be specified".to_string(),
            ));
        }

        if self.camera.port == 0 {
            return Err(ConfigError::Message(
                "Camera port must be greater than 0".to_string(),
            ));
        }

        if self.camera.username.is_empty() {
            return Err(ConfigError::Message(
                "Camera username must be specified".to_string(),
            ));
        }

        if self.session.reconnect_delay_secs == 0 {
            return Err(ConfigError::Message(
                "Session reconnect_delay_secs must be greater than 0".to_string(),
            ));
        }

        if self.session.max_reconnect_delay_secs > MAX_RECONNECT_DELAY_SECS {
            return Err(ConfigError::Message(format!(
                "Session reconnect delays must not exceed {} seconds",
                MAX_RECONNECT_DELAY_SECS
            )));
        }

        if self.session.max_reconnect_delay_secs < self.session.reconnect_delay_secs {
            return Err(ConfigError::Message(
                "Session max_reconnect_delay_secs must not be below reconnect_delay_secs"
                    .to_string(),
            ));
        }

        if self.session.connect_timeout_secs == 0 {
            return Err(ConfigError::Message(
                "Session connect_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.session.max_frame_bytes == 0 {
            return Err(ConfigError::Message(
                "Session max_frame_bytes must be greater than 0".to_string(),
            ));
        }

        if self.alarm.stale_after_ms == 0 {
            return Err(ConfigError::Message(
                "Alarm stale_after_ms must be greater than 0".to_string(),
            ));
        }

        if self.command.request_timeout_secs == 0 {
            return Err(ConfigError::Message(
                "Command request_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.system.event_bus_capacity == 0 {
            return Err(ConfigError::Message(
                "Event bus capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Copy of the configuration that is safe to log
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if !copy.camera.password.is_empty() {
            copy.camera.password = "********".to_string();
        }
        copy
    }

    /// TOML rendering of the redacted configuration
    pub fn to_toml(&self) -> crate::error::Result<String> {
        Ok(toml::to_string_pretty(&self.redacted())?)
    }
}

impl CameraConfig {
    /// `http://host:port`
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// `host:port` as used for the raw alarm stream socket
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl SessionConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }

    pub fn max_reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.max_reconnect_delay_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl AlarmConfig {
    pub fn stale_after(&self) -> Duration {
        Duration::from_millis(self.stale_after_ms)
    }
}

impl CommandConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for HikwatchConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig {
                host: String::new(),
                port: default_camera_port(),
                username: default_camera_username(),
                password: String::new(),
                log: false,
            },
            session: SessionConfig {
                reconnect_delay_secs: default_reconnect_delay_secs(),
                exponential_backoff: false,
                max_reconnect_delay_secs: default_max_reconnect_delay_secs(),
                connect_timeout_secs: default_connect_timeout_secs(),
                keepalive_idle_ms: default_keepalive_idle_ms(),
                keepalive_interval_secs: default_keepalive_interval_secs(),
                keepalive_retries: default_keepalive_retries(),
                max_frame_bytes: default_max_frame_bytes(),
            },
            alarm: AlarmConfig {
                stale_after_ms: default_stale_after_ms(),
            },
            command: CommandConfig {
                request_timeout_secs: default_request_timeout_secs(),
            },
            system: SystemConfig {
                event_bus_capacity: default_event_bus_capacity(),
            },
        }
    }
}

// Default value functions
fn default_camera_port() -> u16 {
    80
}
fn default_camera_username() -> String {
    "admin".to_string()
}

fn default_reconnect_delay_secs() -> u64 {
    30
}
fn default_max_reconnect_delay_secs() -> u64 {
    300
}
fn default_connect_timeout_secs() -> u64 {
    10
}
fn default_keepalive_idle_ms() -> u64 {
    1000
}
fn default_keepalive_interval_secs() -> u64 {
    5
}
fn default_keepalive_retries() -> u32 {
    12
}
fn default_max_frame_bytes() -> usize {
    64 * 1024
}

fn default_stale_after_ms() -> u64 {
    2000
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_event_bus_capacity() -> usize {
    256
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn create_test_config() -> HikwatchConfig {
        let mut config = HikwatchConfig::default();
        config.camera.host = "192.168.1.64".to_string();
        config.camera.password = "secret".to_string();
        config
    }

    #[test]
    fn test_default_config() {
        let config = create_test_config();

        assert!(config.validate().is_ok());
        assert_eq!(config.camera.port, 80);
        assert_eq!(config.session.reconnect_delay(), Duration::from_secs(30));
        assert_eq!(config.alarm.stale_after(), Duration::from_secs(2));
        assert_eq!(config.session.keepalive_retries, 12);
    }

    #[test]
    fn test_missing_host_fails_fast() {
        let config = HikwatchConfig::default();

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("host"));
    }

    #[test]
    fn test_config_validation() {
        let mut config = create_test_config();

        config.session.reconnect_delay_secs = 0;
        assert!(config.validate().is_err());

        config.session.reconnect_delay_secs = 30;
        config.session.max_reconnect_delay_secs = 10;
        assert!(config.validate().is_err());

        config.session.max_reconnect_delay_secs = 300;
        config.camera.username = String::new();
        assert!(config.validate().is_err());

        config.camera.username = "admin".to_string();
        assert!(config.validate().is_ok());

        config.session.reconnect_delay_secs = u64::MAX;
        config.session.max_reconnect_delay_secs = u64::MAX;
        assert!(config.validate().is_err());

        config.session.reconnect_delay_secs = 30;
        config.session.max_reconnect_delay_secs = MAX_RECONNECT_DELAY_SECS + 1;
        assert!(config.validate().is_err());

        config.session.max_reconnect_delay_secs = MAX_RECONNECT_DELAY_SECS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            r#"
[camera]
host = "10.0.0.5"
port = 8080
username = "operator"
password = "pw"

[alarm]
stale_after_ms = 5000
"#
        )
        .unwrap();

        let config = HikwatchConfig::load_from_file(file.path()).unwrap();

        assert_eq!(config.camera.host, "10.0.0.5");
        assert_eq!(config.camera.port, 8080);
        assert_eq!(config.camera.username, "operator");
        assert!(!config.camera.log);
        assert_eq!(config.alarm.stale_after_ms, 5000);
        assert_eq!(config.session.reconnect_delay_secs, 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_redacted_hides_password() {
        let config = create_test_config();

        let redacted = config.redacted();
        assert_eq!(redacted.camera.password, "********");
        assert_eq!(config.camera.password, "secret");

        let rendered = config.to_toml().unwrap();
        assert!(rendered.contains("[camera]"));
        assert!(rendered.contains("host = \"192.168.1.64\""));
        assert!(!rendered.contains("secret"));
    }

    #[test]
    fn test_base_url() {
        let config = create_test_config();

        assert_eq!(config.camera.base_url(), "http://192.168.1.64:80");
        assert_eq!(config.camera.socket_addr(), "192.168.1.64:80");
    }
}
