use crate::command::CommandClient;
use crate::config::HikwatchConfig;
use crate::error::{EventBusError, HikwatchError, Result};
use crate::events::{AlarmAction, CameraEvent, EventBus, EventFilter, EventReceiver};
use crate::session::{AlarmSession, ReconnectPolicy, SessionStats, SessionStatsSnapshot};
use futures::Stream;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A coalesced alarm transition as delivered by [`CameraClient::alarm_stream`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmNotification {
    pub code: String,
    pub action: AlarmAction,
    pub channel: u32,
}

/// Per-device client: alarm stream session plus control commands.
///
/// Everything is owned by the instance; several clients for different
/// devices can run side by side.
pub struct CameraClient {
    config: HikwatchConfig,
    event_bus: Arc<EventBus>,
    commands: CommandClient,
    stats: Arc<SessionStats>,
    reconnect_policy: Option<ReconnectPolicy>,
    session: Mutex<Option<JoinHandle<()>>>,
    shutdown: CancellationToken,
}

impl CameraClient {
    /// Validate the configuration and build the client. Nothing connects
    /// until [`start`](Self::start).
    pub fn new(config: HikwatchConfig) -> Result<Self> {
        config.validate()?;

        let event_bus = Arc::new(if config.camera.log {
            EventBus::with_debug_logging(config.system.event_bus_capacity)
        } else {
            EventBus::new(config.system.event_bus_capacity)
        });
        let commands = CommandClient::new(&config.camera, &config.command, Arc::clone(&event_bus))?;

        Ok(Self {
            config,
            event_bus,
            commands,
            stats: Arc::new(SessionStats::new()),
            reconnect_policy: None,
            session: Mutex::new(None),
            shutdown: CancellationToken::new(),
        })
    }

    /// Override the reconnect policy derived from configuration
    pub fn with_reconnect_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect_policy = Some(policy);
        self
    }

    /// Spawn the alarm stream session. A second call while it runs is a no-op.
    pub async fn start(&self) -> Result<()> {
        if self.shutdown.is_cancelled() {
            return Err(HikwatchError::system("Camera client has been stopped"));
        }

        let mut session = self.session.lock().await;
        if let Some(task) = session.as_ref() {
            if !task.is_finished() {
                debug!("Alarm session already running");
                return Ok(());
            }
        }

        let mut alarm_session = AlarmSession::new(&self.config, Arc::clone(&self.event_bus))
            .with_stats(Arc::clone(&self.stats));
        if let Some(policy) = &self.reconnect_policy {
            alarm_session = alarm_session.with_reconnect_policy(policy.clone());
        }

        *session = Some(tokio::spawn(alarm_session.run(self.shutdown.clone())));
        info!("Camera client started for {}", self.config.camera.socket_addr());
        Ok(())
    }

    /// Cancel the session and its reconnect timer, then wait for it to end
    pub async fn stop(&self) -> Result<()> {
        self.shutdown.cancel();

        let task = self.session.lock().await.take();
        if let Some(task) = task {
            task.await.map_err(|e| {
                warn!("Alarm session task failed: {}", e);
                HikwatchError::system(format!("Alarm session task failed: {}", e))
            })?;
        }

        info!("Camera client stopped");
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        self.session
            .lock()
            .await
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    pub fn config(&self) -> &HikwatchConfig {
        &self.config
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.event_bus)
    }

    /// Receive every notification
    pub fn subscribe(&self) -> broadcast::Receiver<CameraEvent> {
        self.event_bus.subscribe()
    }

    pub fn subscribe_filtered<S: Into<String>>(&self, filter: EventFilter, name: S) -> EventReceiver {
        self.event_bus.subscribe_filtered(filter, name)
    }

    /// Alarm transitions only, as an async stream. Ends once the client and
    /// its session are gone; a lagging consumer skips ahead.
    pub fn alarm_stream(&self) -> impl Stream<Item = AlarmNotification> + Send + 'static {
        let mut receiver = self
            .event_bus
            .subscribe_filtered(EventFilter::EventTypes(vec!["alarm"]), "alarm-stream");

        async_stream::stream! {
            loop {
                match receiver.recv().await {
                    Ok(CameraEvent::Alarm { code, action, channel, .. }) => {
                        yield AlarmNotification { code, action, channel };
                    }
                    Ok(_) | Err(EventBusError::Lagged { .. }) => continue,
                    Err(_) => break,
                }
            }
        }
    }

    pub fn commands(&self) -> &CommandClient {
        &self.commands
    }

    /// Alarm session counters since the client was created
    pub fn stats(&self) -> SessionStatsSnapshot {
        self.stats.snapshot()
    }
}
