use super::keepalive::KeepaliveSettings;
use super::reconnect::{ReconnectPolicy, ReconnectTimer, TimerOutcome};
use super::request::{build_alert_stream_request, ResponseHead};
use super::stats::SessionStats;
use crate::alarm::{decode_frame, AlarmCorrelator, FrameAssembler};
use crate::config::{CameraConfig, HikwatchConfig};
use crate::error::{HikwatchError, Result};
use crate::events::{CameraEvent, EventBus};
use bytes::BytesMut;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

const READ_BUFFER_BYTES: usize = 8 * 1024;

/// How a connection ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamEnd {
    Closed,
    Shutdown,
}

/// Persistent connection to a device's alarm stream.
///
/// Owns the correlator, so alarm state survives reconnects. Every transition
/// is published on the event bus as an `alarm` notification.
pub struct AlarmSession {
    camera: CameraConfig,
    policy: ReconnectPolicy,
    connect_timeout: Duration,
    keepalive: KeepaliveSettings,
    max_frame_bytes: usize,
    correlator: AlarmCorrelator,
    event_bus: Arc<EventBus>,
    stats: Arc<SessionStats>,
    timer: ReconnectTimer,
    failed_attempts: u32,
}

impl AlarmSession {
    pub fn new(config: &HikwatchConfig, event_bus: Arc<EventBus>) -> Self {
        Self {
            camera: config.camera.clone(),
            policy: ReconnectPolicy::from_config(&config.session),
            connect_timeout: config.session.connect_timeout(),
            keepalive: KeepaliveSettings::from_config(&config.session),
            max_frame_bytes: config.session.max_frame_bytes,
            correlator: AlarmCorrelator::new(config.alarm.stale_after())
                .with_verbose(config.camera.log),
            event_bus,
            stats: Arc::new(SessionStats::new()),
            timer: ReconnectTimer::new(),
            failed_attempts: 0,
        }
    }

    /// Override the reconnect policy derived from configuration
    pub fn with_reconnect_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Record into counters owned by the caller
    pub fn with_stats(mut self, stats: Arc<SessionStats>) -> Self {
        self.stats = stats;
        self
    }

    pub fn stats(&self) -> Arc<SessionStats> {
        Arc::clone(&self.stats)
    }

    /// Connect, stream and reconnect until `shutdown` fires
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!("Alarm session started for {}", self.camera.socket_addr());

        loop {
            self.stats.record_connect_attempt();

            let connected = tokio::select! {
                result = self.connect() => result,
                _ = shutdown.cancelled() => break,
            };

            match connected {
                Ok(stream) => {
                    self.stats.record_connection();
                    self.publish(CameraEvent::connected(self.camera.socket_addr()));

                    match self.stream_alarms(stream, &shutdown).await {
                        Ok(StreamEnd::Shutdown) => break,
                        Ok(StreamEnd::Closed) => {
                            debug!("Alarm stream closed by {}", self.camera.socket_addr());
                        }
                        Err(e) => {
                            warn!("Alarm stream failed: {}", e);
                            self.stats.record_error();
                            self.publish(CameraEvent::error(e.to_string()));
                        }
                    }
                }
                Err(e) => {
                    warn!("Failed to open alarm stream: {}", e);
                    self.stats.record_error();
                    self.publish(CameraEvent::error(e.to_string()));
                }
            }

            let delay = self.policy.delay_for(self.failed_attempts);
            self.failed_attempts = self.failed_attempts.saturating_add(1);
            self.timer.schedule(delay);
            self.stats.record_disconnect();
            self.publish(CameraEvent::disconnected(delay));

            if self.timer.wait(&shutdown).await == TimerOutcome::Cancelled {
                break;
            }
            debug!("Reconnecting to {}", self.camera.socket_addr());
        }

        self.timer.cancel();
        info!("Alarm session stopped");
    }

    async fn connect(&self) -> Result<TcpStream> {
        let addr = self.camera.socket_addr();
        debug!("Connecting to alarm stream at {}", addr);

        let mut stream = timeout(self.connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| {
                HikwatchError::stream(format!(
                    "Connection to {} timed out after {:?}",
                    addr, self.connect_timeout
                ))
            })??;

        if let Err(e) = self.keepalive.apply(&stream) {
            warn!("Failed to enable TCP keep-alive: {}", e);
        }

        let request = build_alert_stream_request(&self.camera);
        stream.write_all(request.as_bytes()).await?;

        Ok(stream)
    }

    async fn stream_alarms(
        &mut self,
        mut stream: TcpStream,
        shutdown: &CancellationToken,
    ) -> Result<StreamEnd> {
        let mut buffer = BytesMut::with_capacity(READ_BUFFER_BYTES);
        let mut head = ResponseHead::new();
        let mut assembler = FrameAssembler::new(self.max_frame_bytes);

        loop {
            buffer.clear();

            let read = tokio::select! {
                result = stream.read_buf(&mut buffer) => result?,
                _ = shutdown.cancelled() => return Ok(StreamEnd::Shutdown),
            };

            if read == 0 {
                return Ok(StreamEnd::Closed);
            }
            trace!("Read {} bytes from alarm stream", read);

            match head.push(&buffer) {
                Some(Ok(200)) => {
                    debug!("Alarm stream accepted");
                    self.failed_attempts = 0;
                }
                Some(Ok(status)) => {
                    return Err(HikwatchError::stream(format!(
                        "Alarm stream rejected with HTTP status {}",
                        status
                    )));
                }
                Some(Err(reason)) => {
                    return Err(HikwatchError::stream(format!(
                        "Invalid alarm stream response: {}",
                        reason
                    )));
                }
                None => {}
            }

            self.handle_chunk(&mut assembler, &buffer);
        }
    }

    fn handle_chunk(&mut self, assembler: &mut FrameAssembler, chunk: &[u8]) {
        let dropped_before = assembler.dropped_frames();

        for frame in assembler.push(chunk) {
            let Some(event) = decode_frame(&frame) else {
                self.stats.record_frames_dropped(1);
                continue;
            };
            self.stats.record_frame_decoded();

            let transitions = self.correlator.process(&event);
            self.stats.record_alarms_emitted(transitions.len() as u64);
            for transition in transitions {
                self.publish(transition.into_event());
            }
        }

        let oversized = assembler.dropped_frames() - dropped_before;
        if oversized > 0 {
            self.stats.record_frames_dropped(oversized);
        }
    }

    fn publish(&self, event: CameraEvent) {
        if self.event_bus.publish(event).is_err() {
            trace!("No subscribers for alarm session notification");
        }
    }
}
