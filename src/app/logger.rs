use super::types::OutputFormat;
use crate::error::EventBusError;
use crate::events::{CameraEvent, EventFilter, EventHandler};
use chrono::{DateTime, Local, SecondsFormat, Utc};
use serde_json::json;

/// Prints every notification as one line on stdout
pub struct AlarmLogger {
    format: OutputFormat,
    printed: u64,
}

impl AlarmLogger {
    pub fn new(format: OutputFormat) -> Self {
        Self { format, printed: 0 }
    }

    pub fn printed(&self) -> u64 {
        self.printed
    }

    /// Render one notification as an output line
    pub fn format_event(&self, event: &CameraEvent) -> String {
        match self.format {
            OutputFormat::Json => Self::json_line(event),
            OutputFormat::Text => Self::text_line(event),
        }
    }

    fn json_line(event: &CameraEvent) -> String {
        let timestamp: DateTime<Utc> = event.timestamp().into();
        let mut line = json!({
            "timestamp": timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            "event": event.event_type(),
        });

        let details = match event {
            CameraEvent::Connected { host, .. } => json!({ "host": host }),
            CameraEvent::Disconnected { reconnect_in, .. } => {
                json!({ "reconnect_in_ms": reconnect_in.as_millis() as u64 })
            }
            CameraEvent::Error { message, .. } => json!({ "message": message }),
            CameraEvent::Alarm {
                code,
                action,
                channel,
                ..
            } => json!({ "code": code, "action": action.as_str(), "channel": channel }),
            CameraEvent::PtzStatus { body, .. } => json!({ "body": body }),
        };

        if let (Some(line), Some(details)) = (line.as_object_mut(), details.as_object()) {
            line.extend(details.clone());
        }
        line.to_string()
    }

    fn text_line(event: &CameraEvent) -> String {
        let timestamp: DateTime<Local> = event.timestamp().into();
        format!(
            "{} {}",
            timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
            event.description()
        )
    }
}

#[async_trait::async_trait]
impl EventHandler for AlarmLogger {
    async fn handle_event(&mut self, event: CameraEvent) -> Result<(), EventBusError> {
        println!("{}", self.format_event(&event));
        self.printed += 1;
        Ok(())
    }

    fn handler_name(&self) -> &str {
        "alarm-logger"
    }

    fn event_filter(&self) -> EventFilter {
        EventFilter::All
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::AlarmAction;
    use std::time::Duration;

    #[test]
    fn test_json_alarm_line() {
        let logger = AlarmLogger::new(OutputFormat::Json);
        let event = CameraEvent::alarm("VideoMotion", AlarmAction::Start, 1);

        let line: serde_json::Value = serde_json::from_str(&logger.format_event(&event)).unwrap();

        assert_eq!(line["event"], "alarm");
        assert_eq!(line["code"], "VideoMotion");
        assert_eq!(line["action"], "Start");
        assert_eq!(line["channel"], 1);
        assert!(line["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn test_json_disconnect_line() {
        let logger = AlarmLogger::new(OutputFormat::Json);
        let event = CameraEvent::disconnected(Duration::from_secs(30));

        let line: serde_json::Value = serde_json::from_str(&logger.format_event(&event)).unwrap();

        assert_eq!(line["event"], "end");
        assert_eq!(line["reconnect_in_ms"], 30_000);
    }

    #[test]
    fn test_text_line() {
        let logger = AlarmLogger::new(OutputFormat::Text);
        let event = CameraEvent::alarm("LineDetection", AlarmAction::Stop, 2);

        let line = logger.format_event(&event);
        assert!(line.ends_with(" Alarm LineDetection Stop on channel 2"));
    }

    #[tokio::test]
    async fn test_handler_counts_printed_lines() {
        let mut logger = AlarmLogger::new(OutputFormat::Text);

        logger
            .handle_event(CameraEvent::connected("cam"))
            .await
            .unwrap();
        logger
            .handle_event(CameraEvent::error("boom"))
            .await
            .unwrap();

        assert_eq!(logger.printed(), 2);
        assert_eq!(logger.handler_name(), "alarm-logger");
    }
}
