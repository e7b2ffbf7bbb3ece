use super::CommandClient;
use crate::error::{HikwatchError, Result};
use crate::events::CameraEvent;
use reqwest::StatusCode;
use std::fmt;
use std::str::FromStr;
use tracing::info;

pub const MIN_PTZ_SPEED: u8 = 1;
pub const MAX_PTZ_SPEED: u8 = 8;

const PTZ_PATH: &str = "/cgi-bin/ptz.cgi";

/// Pan/tilt direction understood by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PtzDirection {
    Up,
    Down,
    Left,
    Right,
    LeftUp,
    RightUp,
    LeftDown,
    RightDown,
}

impl PtzDirection {
    pub const ALL: [PtzDirection; 8] = [
        PtzDirection::Up,
        PtzDirection::Down,
        PtzDirection::Left,
        PtzDirection::Right,
        PtzDirection::LeftUp,
        PtzDirection::RightUp,
        PtzDirection::LeftDown,
        PtzDirection::RightDown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PtzDirection::Up => "Up",
            PtzDirection::Down => "Down",
            PtzDirection::Left => "Left",
            PtzDirection::Right => "Right",
            PtzDirection::LeftUp => "LeftUp",
            PtzDirection::RightUp => "RightUp",
            PtzDirection::LeftDown => "LeftDown",
            PtzDirection::RightDown => "RightDown",
        }
    }
}

impl fmt::Display for PtzDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PtzDirection {
    type Err = HikwatchError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|direction| direction.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| HikwatchError::validation(format!("Invalid PTZ direction: {}", s)))
    }
}

/// Whether a move starts or stops
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PtzAction {
    Start,
    Stop,
}

impl PtzAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            PtzAction::Start => "start",
            PtzAction::Stop => "stop",
        }
    }
}

impl fmt::Display for PtzAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PtzAction {
    type Err = HikwatchError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "start" => Ok(PtzAction::Start),
            "stop" => Ok(PtzAction::Stop),
            other => Err(HikwatchError::validation(format!(
                "Invalid PTZ action: {}",
                other
            ))),
        }
    }
}

impl CommandClient {
    /// Raw PTZ command with four numeric arguments
    pub async fn ptz_command(&self, cmd: &str, args: [i32; 4]) -> Result<()> {
        let result = async {
            if cmd.is_empty() || !cmd.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(HikwatchError::validation(format!(
                    "Invalid PTZ command: '{}'",
                    cmd
                )));
            }

            let path = format!(
                "{}?action=start&channel=0&code={}&arg1={}&arg2={}&arg3={}&arg4={}",
                PTZ_PATH, cmd, args[0], args[1], args[2], args[3]
            );
            self.expect_ok(&path, "PTZ command").await
        }
        .await;

        self.reported(result)
    }

    /// Move to a stored preset
    pub async fn ptz_preset(&self, preset: u32) -> Result<()> {
        let result = async {
            if preset == 0 {
                return Err(HikwatchError::validation("Invalid PTZ preset: 0"));
            }

            let path = format!(
                "{}?action=start&channel=0&code=GotoPreset&arg1=0&arg2={}&arg3=0",
                PTZ_PATH, preset
            );
            self.expect_ok(&path, "PTZ preset").await
        }
        .await;

        self.reported(result)
    }

    /// Zoom in (positive) or out (negative); zero does nothing
    pub async fn ptz_zoom(&self, multiplier: i32) -> Result<()> {
        let code = match multiplier {
            0 => return Ok(()),
            m if m > 0 => "ZoomTele",
            _ => "ZoomWide",
        };

        let path = format!(
            "{}?action=start&channel=0&code={}&arg1=0&arg2={}&arg3=0",
            PTZ_PATH, code, multiplier
        );
        let result = self.expect_ok(&path, "PTZ zoom").await;
        self.reported(result)
    }

    /// Start or stop a pan/tilt move at `speed` (1 to 8)
    pub async fn ptz_move(
        &self,
        direction: PtzDirection,
        action: PtzAction,
        speed: u8,
    ) -> Result<()> {
        let result = async {
            if !(MIN_PTZ_SPEED..=MAX_PTZ_SPEED).contains(&speed) {
                return Err(HikwatchError::validation(format!(
                    "Invalid PTZ speed: {} (expected {}-{})",
                    speed, MIN_PTZ_SPEED, MAX_PTZ_SPEED
                )));
            }

            let path = format!(
                "{}?action={}&channel=0&code={}&arg1={}&arg2={}&arg3=0",
                PTZ_PATH, action, direction, speed, speed
            );
            self.expect_ok(&path, "PTZ move").await
        }
        .await;

        self.reported(result)
    }

    /// [`ptz_move`](Self::ptz_move) with direction and action given as text
    pub async fn ptz_move_named(&self, direction: &str, action: &str, speed: u8) -> Result<()> {
        let parsed = direction
            .parse::<PtzDirection>()
            .and_then(|direction| Ok((direction, action.parse::<PtzAction>()?)));

        match parsed {
            Ok((direction, action)) => self.ptz_move(direction, action, speed).await,
            Err(e) => self.reported(Err(e)),
        }
    }

    /// Poll the PTZ position; the cleaned body is also published as `ptz_status`
    pub async fn ptz_status(&self) -> Result<String> {
        let result = async {
            let (status, body) = self
                .get_text(&format!("{}?action=getStatus", PTZ_PATH))
                .await?;

            if status != StatusCode::OK {
                return Err(HikwatchError::command(format!(
                    "Failed to query PTZ status (HTTP {})",
                    status.as_u16()
                )));
            }
            Ok(clean_status_body(&body))
        }
        .await;

        let body = self.reported(result)?;
        info!("PTZ status received ({} lines)", body.lines().count());
        self.publish(CameraEvent::ptz_status(body.clone()));
        Ok(body)
    }
}

/// Trim every line, drop blank ones
pub(super) fn clean_status_body(body: &str) -> String {
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_parsing() {
        assert_eq!("LeftUp".parse::<PtzDirection>().unwrap(), PtzDirection::LeftUp);
        assert_eq!("rightdown".parse::<PtzDirection>().unwrap(), PtzDirection::RightDown);
        assert!(matches!(
            "Sideways".parse::<PtzDirection>(),
            Err(HikwatchError::Validation { .. })
        ));

        for direction in PtzDirection::ALL {
            assert_eq!(direction.as_str().parse::<PtzDirection>().unwrap(), direction);
        }
    }

    #[test]
    fn test_action_parsing() {
        assert_eq!("start".parse::<PtzAction>().unwrap(), PtzAction::Start);
        assert_eq!("stop".parse::<PtzAction>().unwrap(), PtzAction::Stop);
        assert!("pause".parse::<PtzAction>().is_err());
    }

    #[test]
    fn test_clean_status_body() {
        let body = "status.Postion[0]=120\r\n  status.Postion[1]=15 \r\n\r\nstatus.ZoomValue=1\r\n";

        assert_eq!(
            clean_status_body(body),
            "status.Postion[0]=120\nstatus.Postion[1]=15\nstatus.ZoomValue=1"
        );
        assert_eq!(clean_status_body("\r\n \r\n"), "");
    }
}
