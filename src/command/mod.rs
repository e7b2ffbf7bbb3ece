mod client;
mod media;
mod profile;
mod ptz;


pub use client::CommandClient;
pub use media::{ChannelDescriptor, StreamChannel, VideoDescriptor, JPEG_SOI};
pub use profile::DayNightProfile;
pub use ptz::{PtzAction, PtzDirection, MAX_PTZ_SPEED, MIN_PTZ_SPEED};
