use crate::config::CameraConfig;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Device endpoint delivering the multipart alarm stream
pub const ALERT_STREAM_PATH: &str = "/ISAPI/Event/notification/alertStream";

/// Longest response head accepted before the status line is given up on
const MAX_HEAD_BYTES: usize = 1024;

/// `Basic <base64(user:pass)>`
pub fn basic_auth_value(username: &str, password: &str) -> String {
    let credentials = format!("{}:{}", username, password);
    format!("Basic {}", STANDARD.encode(credentials))
}

/// Raw HTTP/1.1 request opening the alarm stream
pub fn build_alert_stream_request(camera: &CameraConfig) -> String {
    format!(
        "GET {} HTTP/1.1\r\n\
         Host: {}\r\n\
         Authorization: {}\r\n\
         Accept: multipart/x-mixed-replace\r\n\
         \r\n",
        ALERT_STREAM_PATH,
        camera.socket_addr(),
        basic_auth_value(&camera.username, &camera.password)
    )
}

/// Status code of an `HTTP/1.x NNN reason` line
pub fn parse_status_line(line: &[u8]) -> Option<u16> {
    let line = std::str::from_utf8(line).ok()?;
    let mut parts = line.split_whitespace();

    let version = parts.next()?;
    if !version.starts_with("HTTP/") {
        return None;
    }

    let code = parts.next()?;
    if code.len() != 3 {
        return None;
    }
    code.parse().ok()
}

/// Collects the first line of the stream response across reads
#[derive(Debug, Default)]
pub struct ResponseHead {
    buffer: Vec<u8>,
    status: Option<Result<u16, String>>,
}

impl ResponseHead {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk; returns the verdict once the status line is complete.
    ///
    /// `Ok(code)` for a parseable status line, `Err` when the line is
    /// unreadable or never terminates. The verdict is returned only once.
    pub fn push(&mut self, chunk: &[u8]) -> Option<Result<u16, String>> {
        if self.status.is_some() {
            return None;
        }

        let room = (MAX_HEAD_BYTES + 1).saturating_sub(self.buffer.len());
        self.buffer.extend_from_slice(&chunk[..chunk.len().min(room)]);

        let verdict = match self.buffer.iter().position(|&b| b == b'\n') {
            Some(end) => {
                let line = self.buffer[..end].strip_suffix(b"\r").unwrap_or(&self.buffer[..end]);
                match parse_status_line(line) {
                    Some(code) => Ok(code),
                    None => Err(format!(
                        "unexpected response line '{}'",
                        String::from_utf8_lossy(line)
                    )),
                }
            }
            None if self.buffer.len() > MAX_HEAD_BYTES => {
                Err("response status line too long".to_string())
            }
            None => return None,
        };

        self.status = Some(verdict.clone());
        Some(verdict)
    }

    pub fn is_complete(&self) -> bool {
        self.status.is_some()
    }
}
