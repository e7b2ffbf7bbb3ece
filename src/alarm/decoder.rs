use crate::events::AlarmAction;
use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::trace;

/// Root element of every alarm document on the stream
pub const ENVELOPE_TAG: &str = "EventNotificationAlert";

/// One alarm report as sent by the device, with code and state normalized
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedAlarmEvent {
    pub code: String,
    pub action: AlarmAction,
    pub channel: u32,
    /// Number of active reports; 0 is a heartbeat
    pub active_post_count: u32,
}

impl DecodedAlarmEvent {
    pub fn is_heartbeat(&self) -> bool {
        self.active_post_count == 0
    }
}

/// Map a device event code to its display label. Unknown codes pass through.
pub fn normalize_event_code(raw: &str) -> String {
    match raw {
        "IO" => "AlarmLocal",
        "VMD" => "VideoMotion",
        "linedetection" => "LineDetection",
        "videoloss" => "VideoLoss",
        "shelteralarm" => "VideoBlind",
        other => other,
    }
    .to_string()
}

/// Map a device event state to an alarm action. Unknown states pass through.
pub fn normalize_event_state(raw: &str) -> AlarmAction {
    match raw {
        "active" => AlarmAction::Start,
        "inactive" => AlarmAction::Stop,
        other => AlarmAction::Other(other.to_string()),
    }
}

/// Decode one alarm document.
///
/// Returns `None` for anything that is not a complete, well-formed
/// `EventNotificationAlert` carrying the four expected fields. Partial frames
/// are routine on this stream, so failures are only traced.
pub fn decode_frame(frame: &[u8]) -> Option<DecodedAlarmEvent> {
    let result = parse_envelope(frame).and_then(EnvelopeFields::into_event);

    match result {
        Ok(event) => Some(event),
        Err(reason) => {
            trace!("Dropping alarm frame ({} bytes): {}", frame.len(), reason);
            None
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Field {
    EventType,
    EventState,
    ChannelId,
    ActivePostCount,
}

impl Field {
    fn from_tag(tag: &[u8]) -> Option<Self> {
        match tag {
            b"eventType" => Some(Field::EventType),
            b"eventState" => Some(Field::EventState),
            b"channelID" => Some(Field::ChannelId),
            b"activePostCount" => Some(Field::ActivePostCount),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct EnvelopeFields {
    event_type: Option<String>,
    event_state: Option<String>,
    channel_id: Option<String>,
    active_post_count: Option<String>,
}

impl EnvelopeFields {
    fn set(&mut self, field: Field, value: &str) {
        let slot = match field {
            Field::EventType => &mut self.event_type,
            Field::EventState => &mut self.event_state,
            Field::ChannelId => &mut self.channel_id,
            Field::ActivePostCount => &mut self.active_post_count,
        };
        *slot = Some(value.trim().to_string());
    }

    fn into_event(self) -> Result<DecodedAlarmEvent, String> {
        let event_type = self.event_type.ok_or("missing eventType")?;
        let event_state = self.event_state.ok_or("missing eventState")?;
        let channel_id = self.channel_id.ok_or("missing channelID")?;
        let active_post_count = self.active_post_count.ok_or("missing activePostCount")?;

        let channel = channel_id
            .parse::<u32>()
            .map_err(|_| format!("invalid channelID '{}'", channel_id))?;
        let active_post_count = active_post_count
            .parse::<u32>()
            .map_err(|_| format!("invalid activePostCount '{}'", active_post_count))?;

        Ok(DecodedAlarmEvent {
            code: normalize_event_code(&event_type),
            action: normalize_event_state(&event_state),
            channel,
            active_post_count,
        })
    }
}

fn parse_envelope(frame: &[u8]) -> Result<EnvelopeFields, String> {
    let text = std::str::from_utf8(frame).map_err(|e| format!("not UTF-8: {}", e))?;
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut fields = EnvelopeFields::default();
    let mut depth = 0usize;
    let mut current: Option<Field> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(element)) => {
                depth += 1;
                if depth == 1 && element.local_name().as_ref() != ENVELOPE_TAG.as_bytes() {
                    return Err(format!(
                        "unexpected root <{}>",
                        String::from_utf8_lossy(element.name().as_ref())
                    ));
                }
                if depth == 2 {
                    current = Field::from_tag(element.local_name().as_ref());
                }
            }
            Ok(Event::Empty(_)) if depth == 0 => {
                return Err("empty root element".to_string());
            }
            Ok(Event::Text(content)) => {
                if depth == 0 {
                    return Err("text outside the root element".to_string());
                }
                if let (2, Some(field)) = (depth, current) {
                    let value = content.unescape().map_err(|e| e.to_string())?;
                    fields.set(field, &value);
                }
            }
            Ok(Event::CData(content)) => {
                if let (2, Some(field)) = (depth, current) {
                    fields.set(field, &String::from_utf8_lossy(&content));
                }
            }
            Ok(Event::End(_)) => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| "unmatched end tag".to_string())?;
                match depth {
                    0 => return Ok(fields),
                    1 => current = None,
                    _ => {}
                }
            }
            Ok(Event::Eof) => return Err("incomplete document".to_string()),
            Ok(_) => {}
            Err(e) => return Err(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MOTION_FRAME: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<EventNotificationAlert version="2.0" xmlns="http://www.hikvision.com/ver20/XMLSchema">
<ipAddress>192.168.1.64</ipAddress>
<portNo>80</portNo>
<protocol>HTTP</protocol>
<channelID>1</channelID>
<dateTime>2024-03-01T10:15:02+01:00</dateTime>
<activePostCount>3</activePostCount>
<eventType>VMD</eventType>
<eventState>active</eventState>
<eventDescription>Motion alarm</eventDescription>
</EventNotificationAlert>"#;

    #[test]
    fn test_decode_motion_frame() {
        let event = decode_frame(MOTION_FRAME.as_bytes()).unwrap();

        assert_eq!(event.code, "VideoMotion");
        assert_eq!(event.action, AlarmAction::Start);
        assert_eq!(event.channel, 1);
        assert_eq!(event.active_post_count, 3);
        assert!(!event.is_heartbeat());
    }

    #[test]
    fn test_decode_heartbeat() {
        let frame = "<EventNotificationAlert><channelID>1</channelID>\
                     <activePostCount>0</activePostCount><eventType>videoloss</eventType>\
                     <eventState>inactive</eventState></EventNotificationAlert>";

        let event = decode_frame(frame.as_bytes()).unwrap();
        assert!(event.is_heartbeat());
        assert_eq!(event.code, "VideoLoss");
        assert_eq!(event.action, AlarmAction::Stop);
    }

    #[test]
    fn test_code_mapping() {
        assert_eq!(normalize_event_code("IO"), "AlarmLocal");
        assert_eq!(normalize_event_code("VMD"), "VideoMotion");
        assert_eq!(normalize_event_code("linedetection"), "LineDetection");
        assert_eq!(normalize_event_code("videoloss"), "VideoLoss");
        assert_eq!(normalize_event_code("shelteralarm"), "VideoBlind");
    }

    #[test]
    fn test_unknown_code_and_state_pass_through() {
        assert_eq!(normalize_event_code("fielddetection"), "fielddetection");
        assert_eq!(
            normalize_event_state("flapping"),
            AlarmAction::Other("flapping".to_string())
        );
        assert_eq!(normalize_event_state("flapping").as_str(), "flapping");
        assert_eq!(normalize_event_state("active"), AlarmAction::Start);
        assert_eq!(normalize_event_state("inactive"), AlarmAction::Stop);
    }

    #[test]
    fn test_truncated_frame_is_dropped() {
        let cut = &MOTION_FRAME[..MOTION_FRAME.len() / 2];
        assert!(decode_frame(cut.as_bytes()).is_none());
    }

    #[test]
    fn test_mime_headers_are_not_a_document() {
        let chunk = "--boundary\r\nContent-Type: application/xml; charset=\"UTF-8\"\r\n\
                     Content-Length: 478\r\n\r\n";
        assert!(decode_frame(chunk.as_bytes()).is_none());
    }

    #[test]
    fn test_wrong_root_is_dropped() {
        let frame = "<ResponseStatus><statusCode>4</statusCode></ResponseStatus>";
        assert!(decode_frame(frame.as_bytes()).is_none());
    }

    #[test]
    fn test_mismatched_tags_are_dropped() {
        let frame = "<EventNotificationAlert><channelID>1</eventType></EventNotificationAlert>";
        assert!(decode_frame(frame.as_bytes()).is_none());
    }

    #[test]
    fn test_missing_field_is_dropped() {
        let frame = "<EventNotificationAlert><channelID>1</channelID>\
                     <eventType>VMD</eventType><eventState>active</eventState>\
                     </EventNotificationAlert>";
        assert!(decode_frame(frame.as_bytes()).is_none());
    }

    #[test]
    fn test_non_numeric_channel_is_dropped() {
        let frame = "<EventNotificationAlert><channelID>one</channelID>\
                     <activePostCount>1</activePostCount><eventType>VMD</eventType>\
                     <eventState>active</eventState></EventNotificationAlert>";
        assert!(decode_frame(frame.as_bytes()).is_none());
    }

    #[test]
    fn test_nested_fields_are_ignored() {
        let frame = "<EventNotificationAlert><channelID>2</channelID>\
                     <DetectionRegionList><DetectionRegionEntry><channelID>9</channelID>\
                     </DetectionRegionEntry></DetectionRegionList>\
                     <activePostCount>1</activePostCount><eventType>linedetection</eventType>\
                     <eventState>active</eventState></EventNotificationAlert>";

        let event = decode_frame(frame.as_bytes()).unwrap();
        assert_eq!(event.channel, 2);
        assert_eq!(event.code, "LineDetection");
    }

    #[test]
    fn test_invalid_utf8_is_dropped() {
        assert!(decode_frame(&[0xff, 0xfe, 0x00, 0x3c]).is_none());
        assert!(decode_frame(&[]).is_none());
    }
}
