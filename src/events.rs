use crate::error::EventBusError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Normalized alarm transition reported by the device
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlarmAction {
    Start,
    Stop,
    /// Device state with no known mapping, kept verbatim
    Other(String),
}

impl AlarmAction {
    pub fn as_str(&self) -> &str {
        match self {
            AlarmAction::Start => "Start",
            AlarmAction::Stop => "Stop",
            AlarmAction::Other(raw) => raw,
        }
    }
}

impl fmt::Display for AlarmAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Notifications emitted by a camera client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CameraEvent {
    /// The alarm stream connection was established
    Connected { host: String, timestamp: SystemTime },
    /// The alarm stream closed and a reconnect is scheduled
    Disconnected {
        reconnect_in: Duration,
        timestamp: SystemTime,
    },
    /// A connection or control command failed
    Error { message: String, timestamp: SystemTime },
    /// Coalesced alarm transition for one event code and channel
    Alarm {
        code: String,
        action: AlarmAction,
        channel: u32,
        timestamp: SystemTime,
    },
    /// Raw response of a PTZ status poll
    PtzStatus { body: String, timestamp: SystemTime },
}

impl CameraEvent {
    pub fn connected<S: Into<String>>(host: S) -> Self {
        CameraEvent::Connected {
            host: host.into(),
            timestamp: SystemTime::now(),
        }
    }

    pub fn disconnected(reconnect_in: Duration) -> Self {
        CameraEvent::Disconnected {
            reconnect_in,
            timestamp: SystemTime::now(),
        }
    }

    pub fn error<S: Into<String>>(message: S) -> Self {
        CameraEvent::Error {
            message: message.into(),
            timestamp: SystemTime::now(),
        }
    }

    pub fn alarm<S: Into<String>>(code: S, action: AlarmAction, channel: u32) -> Self {
        CameraEvent::Alarm {
            code: code.into(),
            action,
            channel,
            timestamp: SystemTime::now(),
        }
    }

    pub fn ptz_status<S: Into<String>>(body: S) -> Self {
        CameraEvent::PtzStatus {
            body: body.into(),
            timestamp: SystemTime::now(),
        }
    }

    /// Get the timestamp of the event
    pub fn timestamp(&self) -> SystemTime {
        match self {
            CameraEvent::Connected { timestamp, .. } => *timestamp,
            CameraEvent::Disconnected { timestamp, .. } => *timestamp,
            CameraEvent::Error { timestamp, .. } => *timestamp,
            CameraEvent::Alarm { timestamp, .. } => *timestamp,
            CameraEvent::PtzStatus { timestamp, .. } => *timestamp,
        }
    }

    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            CameraEvent::Connected { host, .. } => format!("Connected to {}", host),
            CameraEvent::Disconnected { reconnect_in, .. } => {
                format!("Connection closed, reconnecting in {:?}", reconnect_in)
            }
            CameraEvent::Error { message, .. } => format!("Error: {}", message),
            CameraEvent::Alarm {
                code,
                action,
                channel,
                ..
            } => format!("Alarm {} {} on channel {}", code, action, channel),
            CameraEvent::PtzStatus { body, .. } => format!("PTZ status: {}", body),
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            CameraEvent::Connected { .. } => "connect",
            CameraEvent::Disconnected { .. } => "end",
            CameraEvent::Error { .. } => "error",
            CameraEvent::Alarm { .. } => "alarm",
            CameraEvent::PtzStatus { .. } => "ptz_status",
        }
    }
}

/// Async event bus for client notifications using broadcast channels
pub struct EventBus {
    sender: broadcast::Sender<CameraEvent>,
    debug_logging: bool,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            debug_logging: false,
        }
    }

    /// Create a new event bus with debug logging enabled
    pub fn with_debug_logging(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            debug_logging: true,
        }
    }

    /// Subscribe to events and get a receiver
    pub fn subscribe(&self) -> broadcast::Receiver<CameraEvent> {
        self.sender.subscribe()
    }

    /// Subscribe with a filter applied on receive
    pub fn subscribe_filtered<S: Into<String>>(&self, filter: EventFilter, name: S) -> EventReceiver {
        EventReceiver::new(self.sender.subscribe(), filter, name.into())
    }

    /// Publish an event to all subscribers.
    ///
    /// Fails only when nobody is subscribed; callers that fire notifications
    /// into an idle bus may ignore the error.
    pub fn publish(&self, event: CameraEvent) -> Result<usize, EventBusError> {
        if self.debug_logging {
            debug!("Publishing {} event: {}", event.event_type(), event.description());
        }

        match &event {
            CameraEvent::Alarm {
                code,
                action,
                channel,
                ..
            } => {
                info!("Alarm {} {} on channel {}", code, action, channel);
            }
            CameraEvent::Error { message, .. } => {
                error!("Camera error: {}", message);
            }
            CameraEvent::Connected { host, .. } => {
                info!("Alarm stream connected to {}", host);
            }
            CameraEvent::Disconnected { reconnect_in, .. } => {
                warn!("Alarm stream closed, reconnecting in {:?}", reconnect_in);
            }
            CameraEvent::PtzStatus { .. } => {}
        }

        self.sender
            .send(event)
            .map_err(|e| EventBusError::PublishFailed {
                details: e.to_string(),
            })
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Check if there are any active subscribers
    pub fn has_subscribers(&self) -> bool {
        self.sender.receiver_count() > 0
    }

    pub fn debug_logging(&self) -> bool {
        self.debug_logging
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            debug_logging: self.debug_logging,
        }
    }
}

/// Event filter for selective event handling
#[derive(Debug, Clone)]
pub enum EventFilter {
    /// Accept all events
    All,
    /// Accept only specific event types
    EventTypes(Vec<&'static str>),
    /// Accept alarms for the given codes only
    AlarmCodes(Vec<String>),
    /// Custom filter function
    Custom(fn(&CameraEvent) -> bool),
}

impl EventFilter {
    /// Check if an event passes this filter
    pub fn matches(&self, event: &CameraEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::EventTypes(types) => types.contains(&event.event_type()),
            EventFilter::AlarmCodes(codes) => {
                if let CameraEvent::Alarm { code, .. } = event {
                    codes.contains(code)
                } else {
                    false
                }
            }
            EventFilter::Custom(filter_fn) => filter_fn(event),
        }
    }
}

/// Event receiver with filtering capabilities
pub struct EventReceiver {
    receiver: broadcast::Receiver<CameraEvent>,
    filter: EventFilter,
    name: String,
}

impl EventReceiver {
    /// Create a new event receiver with a filter
    pub fn new(
        receiver: broadcast::Receiver<CameraEvent>,
        filter: EventFilter,
        name: String,
    ) -> Self {
        Self {
            receiver,
            filter,
            name,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }

    /// Receive the next filtered event
    pub async fn recv(&mut self) -> Result<CameraEvent, EventBusError> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        debug!(
                            "Receiver '{}' received event: {}",
                            self.name,
                            event.description()
                        );
                        return Ok(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                    return Err(EventBusError::Lagged { skipped: n });
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed for receiver '{}'", self.name);
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&mut self) -> Result<Option<CameraEvent>, EventBusError> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        return Ok(Some(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => {
                    return Ok(None);
                }
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                    return Err(EventBusError::Lagged { skipped: n });
                }
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }
}

/// Trait for components that consume bus events
#[async_trait::async_trait]
pub trait EventHandler: Send {
    /// Handle a single event
    async fn handle_event(&mut self, event: CameraEvent) -> Result<(), EventBusError>;

    /// Get the handler name for debugging
    fn handler_name(&self) -> &str;

    /// Get the event filter for this handler
    fn event_filter(&self) -> EventFilter;
}

/// Subscribe a handler to the bus and drive it on its own task.
///
/// The subscription is taken before this returns, so nothing published
/// afterwards is missed. Lagging is logged and skipped; a handler error is
/// logged and the loop keeps going. The task ends when the bus closes.
pub fn spawn_handler<H>(bus: &EventBus, handler: H) -> JoinHandle<()>
where
    H: EventHandler + 'static,
{
    spawn_handler_until(bus, handler, CancellationToken::new())
}

/// Like [`spawn_handler`], but also stops once `shutdown` fires. Events
/// already queued at that point are still handled before the task ends.
pub fn spawn_handler_until<H>(
    bus: &EventBus,
    mut handler: H,
    shutdown: CancellationToken,
) -> JoinHandle<()>
where
    H: EventHandler + 'static,
{
    let mut receiver = bus.subscribe_filtered(handler.event_filter(), handler.handler_name());

    tokio::spawn(async move {
        loop {
            let received = tokio::select! {
                biased;
                received = receiver.recv() => received,
                _ = shutdown.cancelled() => break,
            };

            match received {
                Ok(event) => dispatch(&mut handler, event).await,
                Err(EventBusError::Lagged { .. }) => continue,
                Err(_) => break,
            }
        }

        loop {
            match receiver.try_recv() {
                Ok(Some(event)) => dispatch(&mut handler, event).await,
                Err(EventBusError::Lagged { .. }) => continue,
                Ok(None) | Err(_) => break,
            }
        }

        debug!("Handler '{}' stopped", handler.handler_name());
    })
}

async fn dispatch<H: EventHandler>(handler: &mut H, event: CameraEvent) {
    if let Err(e) = handler.handle_event(event).await {
        warn!("Handler '{}' failed: {}", handler.handler_name(), e);
    }
}
