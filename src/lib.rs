pub mod alarm;
pub mod app;
pub mod client;
pub mod command;
pub mod config;
pub mod error;
pub mod events;
pub mod session;

pub use alarm::{decode_frame, AlarmCorrelator, AlarmKey, AlarmTransition, DecodedAlarmEvent, FrameAssembler};
pub use app::{AlarmLogger, HikwatchApp, OutputFormat, ShutdownHandle, ShutdownReason};
pub use client::{AlarmNotification, CameraClient};
pub use command::{ChannelDescriptor, CommandClient, DayNightProfile, PtzAction, PtzDirection, StreamChannel};
pub use config::HikwatchConfig;
pub use error::{EventBusError, HikwatchError, Result};
pub use events::{
    spawn_handler, spawn_handler_until, AlarmAction, CameraEvent, EventBus, EventFilter, EventHandler,
    EventReceiver,
};
pub use session::{AlarmSession, ReconnectPolicy, ReconnectTimer, SessionStatsSnapshot};
