use super::CommandClient;
use crate::error::{HikwatchError, Result};
use reqwest::StatusCode;
use std::fmt;
use tracing::{debug, info};

const CONFIG_PATH: &str = "/cgi-bin/configManager.cgi?action=setConfig";

/// Image profile selected on the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayNightProfile {
    Day,
    Night,
}

impl DayNightProfile {
    /// Setting understood by current firmware
    pub fn primary_query(&self) -> String {
        let value = match self {
            DayNightProfile::Day => 1,
            DayNightProfile::Night => 2,
        };
        format!("{}&VideoInMode[0].Config[0]={}", CONFIG_PATH, value)
    }

    /// Setting for older firmware that answers `Error` to the primary one
    pub fn legacy_query(&self) -> String {
        let value = match self {
            DayNightProfile::Day => 0,
            DayNightProfile::Night => 3,
        };
        format!(
            "{}&VideoInOptions[0].NightOptions.SwitchMode={}",
            CONFIG_PATH, value
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DayNightProfile::Day => "day",
            DayNightProfile::Night => "night",
        }
    }
}

impl fmt::Display for DayNightProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl CommandClient {
    pub async fn day_profile(&self) -> Result<()> {
        self.set_profile(DayNightProfile::Day).await
    }

    pub async fn night_profile(&self) -> Result<()> {
        self.set_profile(DayNightProfile::Night).await
    }

    pub async fn set_profile(&self, profile: DayNightProfile) -> Result<()> {
        let result = async {
            let failed = |status: StatusCode| {
                HikwatchError::command(format!(
                    "Failed to change to {} profile (HTTP {})",
                    profile,
                    status.as_u16()
                ))
            };

            let (status, body) = self.get_text(&profile.primary_query()).await?;
            if status != StatusCode::OK {
                return Err(failed(status));
            }

            if body.trim() == "Error" {
                debug!("Primary profile setting rejected, trying legacy setting");
                let (status, _) = self.get_text(&profile.legacy_query()).await?;
                if status != StatusCode::OK {
                    return Err(failed(status));
                }
            }

            Ok(())
        }
        .await;

        self.reported(result)?;
        info!("Switched to {} profile", profile);
        Ok(())
    }
}
