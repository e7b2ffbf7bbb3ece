use crate::config::{CameraConfig, CommandConfig};
use crate::error::{HikwatchError, Result};
use crate::events::{CameraEvent, EventBus};
use bytes::Bytes;
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use tracing::{debug, trace};

/// One-shot HTTP control requests against a device.
///
/// Independent of the alarm session: every call is its own round trip and
/// any number may be in flight. Failures are published as `error`
/// notifications and returned to the caller.
#[derive(Clone)]
pub struct CommandClient {
    http: Client,
    camera: CameraConfig,
    base_url: String,
    event_bus: Arc<EventBus>,
}

impl CommandClient {
    pub fn new(
        camera: &CameraConfig,
        config: &CommandConfig,
        event_bus: Arc<EventBus>,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            http,
            base_url: camera.base_url(),
            camera: camera.clone(),
            event_bus,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(super) fn camera(&self) -> &CameraConfig {
        &self.camera
    }

    /// Authenticated GET; `path` includes the query string
    pub(super) async fn get(&self, path: &str) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {}", url);

        let response = self
            .http
            .get(&url)
            .basic_auth(&self.camera.username, Some(&self.camera.password))
            .send()
            .await?;

        trace!("{} -> {}", url, response.status());
        Ok(response)
    }

    pub(super) async fn get_text(&self, path: &str) -> Result<(StatusCode, String)> {
        let response = self.get(path).await?;
        let status = response.status();
        let body = response.text().await?;
        Ok((status, body))
    }

    pub(super) async fn get_bytes(&self, path: &str) -> Result<(StatusCode, Bytes)> {
        let response = self.get(path).await?;
        let status = response.status();
        let body = response.bytes().await?;
        Ok((status, body))
    }

    /// GET that must answer 200 with a body of `OK`
    pub(super) async fn expect_ok(&self, path: &str, what: &str) -> Result<()> {
        let (status, body) = self.get_text(path).await?;

        if status != StatusCode::OK || body.trim() != "OK" {
            return Err(HikwatchError::command(format!(
                "Failed to issue {} (HTTP {}: {})",
                what,
                status.as_u16(),
                body.trim()
            )));
        }
        Ok(())
    }

    /// Publish a failed call as an `error` notification and hand the result back
    pub(super) fn reported<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            self.publish(CameraEvent::error(e.to_string()));
        }
        result
    }

    pub(super) fn publish(&self, event: CameraEvent) {
        if self.event_bus.publish(event).is_err() {
            trace!("No subscribers for command notification");
        }
    }
}
