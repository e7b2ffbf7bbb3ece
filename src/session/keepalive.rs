use crate::config::SessionConfig;
use socket2::{SockRef, TcpKeepalive};
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::debug;

/// TCP keep-alive tuning for the long-lived alarm stream socket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepaliveSettings {
    /// Idle time before the first probe
    pub idle: Duration,
    /// Time between unanswered probes
    pub interval: Duration,
    /// Unanswered probes before the peer is declared dead
    pub retries: u32,
}

impl KeepaliveSettings {
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            idle: Duration::from_millis(config.keepalive_idle_ms),
            interval: Duration::from_secs(config.keepalive_interval_secs),
            retries: config.keepalive_retries,
        }
    }

    /// Roughly how long a silent peer survives once probing starts
    pub fn detection_window(&self) -> Duration {
        self.idle + self.interval * self.retries
    }

    /// Enable keep-alive on a connected stream.
    ///
    /// Interval and probe count are only set on platforms that expose them.
    pub fn apply(&self, stream: &TcpStream) -> std::io::Result<()> {
        let keepalive = TcpKeepalive::new().with_time(self.idle);

        #[cfg(any(
            target_os = "linux",
            target_os = "android",
            target_os = "macos",
            target_os = "freebsd",
            target_os = "windows"
        ))]
        let keepalive = keepalive.with_interval(self.interval);

        #[cfg(any(
            target_os = "linux",
            target_os = "android",
            target_os = "macos",
            target_os = "freebsd"
        ))]
        let keepalive = keepalive.with_retries(self.retries);

        SockRef::from(stream).set_tcp_keepalive(&keepalive)?;
        debug!(
            "TCP keep-alive enabled (idle {:?}, interval {:?}, {} probes)",
            self.idle, self.interval, self.retries
        );
        Ok(())
    }
}

impl Default for KeepaliveSettings {
    fn default() -> Self {
        Self {
            idle: Duration::from_secs(1),
            interval: Duration::from_secs(5),
            retries: 12,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HikwatchConfig;
    use tokio::net::TcpListener;

    #[test]
    fn test_defaults_match_session_config() {
        let config = HikwatchConfig::default();

        let settings = KeepaliveSettings::from_config(&config.session);
        assert_eq!(settings, KeepaliveSettings::default());
        assert_eq!(settings.detection_window(), Duration::from_secs(61));
    }

    #[tokio::test]
    async fn test_apply_to_connected_stream() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let client = TcpStream::connect(addr).await.unwrap();
        let _server = listener.accept().await.unwrap();

        KeepaliveSettings::default().apply(&client).unwrap();
        let socket = SockRef::from(&client);
        assert!(socket.keepalive().unwrap());

        #[cfg(target_os = "linux")]
        {
            assert_eq!(socket.keepalive_time().unwrap(), Duration::from_secs(1));
            assert_eq!(socket.keepalive_interval().unwrap(), Duration::from_secs(5));
            assert_eq!(socket.keepalive_retries().unwrap(), 12);
        }
    }
}
