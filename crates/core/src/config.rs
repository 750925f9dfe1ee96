//! Stream request types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Network camera endpoint
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Operator-assigned camera name
    pub id: String,

    /// Device hostname or address
    pub host: String,

    /// Device service port (0 selects the device default)
    pub port: u32,

    pub username: String,

    pub password: String,

    /// Media profile to stream
    pub profile_token: String,
}

impl CameraConfig {
    pub fn new(id: impl Into<String>, host: impl Into<String>, port: u32) -> Self {
        Self {
            id: id.into(),
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    pub fn with_profile(mut self, profile_token: impl Into<String>) -> Self {
        self.profile_token = profile_token.into();
        self
    }
}

impl fmt::Debug for CameraConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CameraConfig")
            .field("id", &self.id)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("profile_token", &self.profile_token)
            .finish()
    }
}

/// Request to stream a camera's media to an RTP destination
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RtpConfig {
    pub camera: Option<CameraConfig>,

    /// Host that receives the RTP packets
    pub destination_host: String,

    pub video_port: u32,

    pub audio_port: u32,
}

impl RtpConfig {
    pub fn new(
        camera: CameraConfig,
        destination_host: impl Into<String>,
        video_port: u32,
        audio_port: u32,
    ) -> Self {
        Self {
            camera: Some(camera),
            destination_host: destination_host.into(),
            video_port,
            audio_port,
        }
    }
}
