use super::types::{OutputFormat, ShutdownReason};
use crate::client::CameraClient;
use crate::config::HikwatchConfig;
use crate::error::Result;
use crate::session::ReconnectPolicy;
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};
use tracing::debug;

/// Requests shutdown of a running watcher; only the first request counts
#[derive(Clone)]
pub struct ShutdownHandle {
    sender: Arc<Mutex<Option<oneshot::Sender<ShutdownReason>>>>,
}

impl ShutdownHandle {
    /// Returns false if shutdown was already requested
    pub async fn trigger(&self, reason: ShutdownReason) -> bool {
        match self.sender.lock().await.take() {
            Some(sender) => sender.send(reason).is_ok(),
            None => {
                debug!("Shutdown already requested, ignoring {}", reason);
                false
            }
        }
    }
}

/// Long-running alarm watcher: one camera client plus the stdout logger
pub struct HikwatchApp {
    pub(super) client: CameraClient,
    pub(super) output: OutputFormat,
    pub(super) shutdown: ShutdownHandle,
    pub(super) shutdown_receiver: Option<oneshot::Receiver<ShutdownReason>>,
}

impl HikwatchApp {
    pub fn new(config: HikwatchConfig, output: OutputFormat) -> Result<Self> {
        let client = CameraClient::new(config)?;
        let (sender, receiver) = oneshot::channel();

        Ok(Self {
            client,
            output,
            shutdown: ShutdownHandle {
                sender: Arc::new(Mutex::new(Some(sender))),
            },
            shutdown_receiver: Some(receiver),
        })
    }

    /// Override the configured reconnect policy
    pub fn with_reconnect_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.client = self.client.with_reconnect_policy(policy);
        self
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    pub fn client(&self) -> &CameraClient {
        &self.client
    }
}
