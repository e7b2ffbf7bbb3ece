use super::CommandClient;
use crate::error::{HikwatchError, Result};
use bytes::Bytes;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::info;

/// JPEG start-of-image marker
pub const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];

/// Main or sub video stream of the first camera input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamChannel {
    #[default]
    Main,
    Sub,
}

impl StreamChannel {
    /// Number used by snapshot and RTSP paths
    pub fn index(&self) -> u32 {
        match self {
            StreamChannel::Main => 1,
            StreamChannel::Sub => 2,
        }
    }

    /// Number used by the ISAPI streaming resource
    pub fn isapi_id(&self) -> u32 {
        self.index() + 100
    }
}

impl fmt::Display for StreamChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamChannel::Main => f.write_str("main"),
            StreamChannel::Sub => f.write_str("sub"),
        }
    }
}

impl FromStr for StreamChannel {
    type Err = HikwatchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "main" | "1" | "101" => Ok(StreamChannel::Main),
            "sub" | "2" | "102" => Ok(StreamChannel::Sub),
            other => Err(HikwatchError::validation(format!(
                "Invalid stream channel: {}",
                other
            ))),
        }
    }
}

/// `StreamingChannel` resource as reported by the device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelDescriptor {
    pub id: u32,
    #[serde(default)]
    pub channel_name: Option<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(rename = "Video", default)]
    pub video: Option<VideoDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoDescriptor {
    #[serde(default)]
    pub video_codec_type: Option<String>,
    #[serde(default)]
    pub video_resolution_width: Option<u32>,
    #[serde(default)]
    pub video_resolution_height: Option<u32>,
    #[serde(default)]
    pub video_quality_control_type: Option<String>,
    #[serde(default)]
    pub constant_bit_rate: Option<u32>,
    #[serde(default)]
    pub vbr_upper_cap: Option<u32>,
    /// Frames per second times 100
    #[serde(default)]
    pub max_frame_rate: Option<u32>,
}

impl VideoDescriptor {
    pub fn frame_rate(&self) -> Option<f64> {
        self.max_frame_rate.map(|rate| f64::from(rate) / 100.0)
    }
}

impl ChannelDescriptor {
    pub fn from_xml(xml: &str) -> Result<Self> {
        Ok(quick_xml::de::from_str(xml)?)
    }
}

impl CommandClient {
    /// Still image from a stream, as JPEG bytes
    pub async fn snapshot(&self, channel: StreamChannel) -> Result<Bytes> {
        let result = async {
            let path = format!("/Streaming/channels/{}/picture", channel.index());
            let (status, body) = self.get_bytes(&path).await?;

            if status != StatusCode::OK {
                return Err(HikwatchError::command(format!(
                    "Failed to fetch {} snapshot (HTTP {})",
                    channel,
                    status.as_u16()
                )));
            }
            if !body.starts_with(&JPEG_SOI) {
                return Err(HikwatchError::command(format!(
                    "Snapshot from {} stream is not a JPEG image",
                    channel
                )));
            }

            Ok(body)
        }
        .await;

        let image = self.reported(result)?;
        info!("Fetched {} snapshot ({} bytes)", channel, image.len());
        Ok(image)
    }

    /// Codec, resolution and rate settings of a stream
    pub async fn channel_info(&self, channel: StreamChannel) -> Result<ChannelDescriptor> {
        let result = async {
            let path = format!("/ISAPI/Streaming/channels/{}", channel.isapi_id());
            let (status, body) = self.get_text(&path).await?;

            if status != StatusCode::OK {
                return Err(HikwatchError::command(format!(
                    "Failed to query {} channel (HTTP {})",
                    channel,
                    status.as_u16()
                )));
            }
            ChannelDescriptor::from_xml(&body)
        }
        .await;

        self.reported(result)
    }

    /// RTSP URL of a stream, credentials embedded
    pub fn rtsp_url(&self, channel: StreamChannel) -> String {
        let camera = self.camera();
        format!(
            "rtsp://{}:{}@{}/Streaming/Channels/{}",
            camera.username,
            camera.password,
            camera.host,
            channel.index()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STREAMING_CHANNEL: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<StreamingChannel version="2.0" xmlns="http://www.hikvision.com/ver20/XMLSchema">
<id>101</id>
<channelName>Camera 01</channelName>
<enabled>true</enabled>
<Transport>
<maxPacketSize>1000</maxPacketSize>
<ControlProtocolList>
<ControlProtocol><streamingTransport>RTSP</streamingTransport></ControlProtocol>
</ControlProtocolList>
</Transport>
<Video>
<enabled>true</enabled>
<videoInputChannelID>1</videoInputChannelID>
<videoCodecType>H.264</videoCodecType>
<videoResolutionWidth>1920</videoResolutionWidth>
<videoResolutionHeight>1080</videoResolutionHeight>
<videoQualityControlType>VBR</videoQualityControlType>
<constantBitRate>4096</constantBitRate>
<vbrUpperCap>4096</vbrUpperCap>
<maxFrameRate>2500</maxFrameRate>
</Video>
</StreamingChannel>"#;

    #[test]
    fn test_parse_channel_descriptor() {
        let descriptor = ChannelDescriptor::from_xml(STREAMING_CHANNEL).unwrap();

        assert_eq!(descriptor.id, 101);
        assert_eq!(descriptor.channel_name.as_deref(), Some("Camera 01"));
        assert_eq!(descriptor.enabled, Some(true));

        let video = descriptor.video.unwrap();
        assert_eq!(video.video_codec_type.as_deref(), Some("H.264"));
        assert_eq!(video.video_resolution_width, Some(1920));
        assert_eq!(video.video_resolution_height, Some(1080));
        assert_eq!(video.frame_rate(), Some(25.0));
    }

    #[test]
    fn test_invalid_descriptor_is_an_error() {
        assert!(matches!(
            ChannelDescriptor::from_xml("<StreamingChannel><id>abc</id></StreamingChannel>"),
            Err(HikwatchError::Xml(_))
        ));
        assert!(ChannelDescriptor::from_xml("not xml").is_err());
    }

    #[test]
    fn test_stream_channel_numbers() {
        assert_eq!(StreamChannel::Main.index(), 1);
        assert_eq!(StreamChannel::Sub.index(), 2);
        assert_eq!(StreamChannel::Main.isapi_id(), 101);
        assert_eq!(StreamChannel::Sub.isapi_id(), 102);
        assert_eq!("SUB".parse::<StreamChannel>().unwrap(), StreamChannel::Sub);
        assert_eq!("101".parse::<StreamChannel>().unwrap(), StreamChannel::Main);
        assert!("third".parse::<StreamChannel>().is_err());
    }
}
