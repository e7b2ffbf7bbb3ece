use super::logger::AlarmLogger;
use super::{HikwatchApp, ShutdownReason};
use crate::error::{HikwatchError, Result};
use crate::events::spawn_handler_until;
use std::time::Duration;
use tokio::signal;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

const LOGGER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

impl HikwatchApp {
    /// Watch the alarm stream until a signal or a shutdown request arrives
    pub async fn run(&mut self) -> Result<i32> {
        let shutdown_receiver = self
            .shutdown_receiver
            .take()
            .ok_or_else(|| HikwatchError::system("Shutdown receiver already taken"))?;

        let logger_shutdown = CancellationToken::new();
        let logger = spawn_handler_until(
            &self.client.event_bus(),
            AlarmLogger::new(self.output),
            logger_shutdown.clone(),
        );

        if let Err(e) = self.client.start().await {
            error!("Failed to start camera client: {}", e);
            logger.abort();
            return Err(e);
        }
        info!(
            "Watching alarms from {}",
            self.client.config().camera.socket_addr()
        );

        self.setup_signal_handlers();

        let shutdown_reason = shutdown_receiver
            .await
            .map_err(|_| HikwatchError::system("Shutdown channel closed unexpectedly"))?;

        info!("Shutdown initiated: {}", shutdown_reason);

        let exit_code = match self.client.stop().await {
            Ok(()) => shutdown_reason.exit_code(),
            Err(e) => {
                error!("Error stopping camera client: {}", e);
                1
            }
        };

        // Let the logger print whatever is still queued
        logger_shutdown.cancel();
        if timeout(LOGGER_DRAIN_TIMEOUT, logger).await.is_err() {
            warn!("Alarm logger did not finish within {:?}", LOGGER_DRAIN_TIMEOUT);
        }

        let stats = self.client.stats();
        info!(
            "Session summary: {} connections, {} disconnects, {} errors, {} frames decoded, {} dropped, {} alarms",
            stats.connections,
            stats.disconnects,
            stats.errors,
            stats.frames_decoded,
            stats.frames_dropped,
            stats.alarms_emitted
        );

        Ok(exit_code)
    }

    /// Set up signal handlers for graceful shutdown
    fn setup_signal_handlers(&self) {
        // Handle SIGTERM (systemd stop) - Unix only
        #[cfg(unix)]
        {
            let handle = self.shutdown_handle();
            tokio::spawn(async move {
                match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(mut sigterm) => {
                        if sigterm.recv().await.is_some() {
                            info!("Received SIGTERM signal");
                            handle
                                .trigger(ShutdownReason::Signal("SIGTERM".to_string()))
                                .await;
                        }
                    }
                    Err(e) => warn!("Failed to register SIGTERM handler: {}", e),
                }
            });
        }

        // Handle SIGINT (Ctrl+C) - Cross-platform
        let handle = self.shutdown_handle();
        tokio::spawn(async move {
            if let Ok(()) = signal::ctrl_c().await {
                info!("Received SIGINT signal (Ctrl+C)");
                handle
                    .trigger(ShutdownReason::Signal("SIGINT".to_string()))
                    .await;
            }
        });
    }
}

