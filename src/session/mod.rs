mod keepalive;
mod reconnect;
mod request;
mod stats;
mod stream;


pub use keepalive::KeepaliveSettings;
pub use reconnect::{ReconnectPolicy, ReconnectTimer, TimerOutcome};
pub use request::{
    basic_auth_value, build_alert_stream_request, parse_status_line, ResponseHead,
    ALERT_STREAM_PATH,
};
pub use stats::{SessionStats, SessionStatsSnapshot};
pub use stream::AlarmSession;
