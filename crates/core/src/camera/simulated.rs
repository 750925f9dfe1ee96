//! Simulated camera backend
//!
//! Produces RFC 4566 session descriptions for the requested RTP
//! destination and advances frame counters at a fixed rate, so the service
//! can run end to end without a device on the network.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use super::{Camera, CameraFactory, SessionDescription, StreamContext};
use crate::config::RtpConfig;
use crate::error::CameraError;

const VIDEO_PAYLOAD_TYPE: u8 = 96;
const AUDIO_PAYLOAD_TYPE: u8 = 0;

/// Behaviour of simulated cameras
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulatedCameraSettings {
    /// Frames produced per second
    #[serde(default = "default_frame_rate")]
    pub frame_rate: u32,

    /// Count every Nth frame as dropped (0 = never)
    #[serde(default)]
    pub drop_every: u64,
}

fn default_frame_rate() -> u32 {
    25
}

impl Default for SimulatedCameraSettings {
    fn default() -> Self {
        Self {
            frame_rate: default_frame_rate(),
            drop_every: 0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SimulatedCameraFactory {
    settings: SimulatedCameraSettings,
}

impl SimulatedCameraFactory {
    pub fn new(settings: SimulatedCameraSettings) -> Self {
        Self { settings }
    }
}

impl CameraFactory for SimulatedCameraFactory {
    fn open(&self, config: &RtpConfig) -> Result<Arc<dyn Camera>, CameraError> {
        if config.destination_host.trim().is_empty() {
            return Err(CameraError::Negotiation(
                "RTP destination host is empty".to_string(),
            ));
        }
        Ok(Arc::new(SimulatedCamera::new(
            config.clone(),
            self.settings.clone(),
        )))
    }
}

#[derive(Debug)]
pub struct SimulatedCamera {
    config: RtpConfig,
    settings: SimulatedCameraSettings,
    closed: AtomicBool,
}

impl SimulatedCamera {
    pub fn new(config: RtpConfig, settings: SimulatedCameraSettings) -> Self {
        Self {
            config,
            settings,
            closed: AtomicBool::new(false),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// SDP for both tracks, addressed to the RTP destination
    pub fn describe(&self) -> SessionDescription {
        let name = self
            .config
            .camera
            .as_ref()
            .map(|c| if c.id.is_empty() { c.host.as_str() } else { c.id.as_str() })
            .unwrap_or("camera");
        let video = format!(
            "{}m=video {} RTP/AVP {pt}\r\na=rtpmap:{pt} H264/90000\r\na=fmtp:{pt} packetization-mode=1\r\na=sendonly\r\n",
            self.session_header(name),
            self.config.video_port,
            pt = VIDEO_PAYLOAD_TYPE,
        );
        let audio = format!(
            "{}m=audio {} RTP/AVP {pt}\r\na=rtpmap:{pt} PCMU/8000\r\na=sendonly\r\n",
            self.session_header(name),
            self.config.audio_port,
            pt = AUDIO_PAYLOAD_TYPE,
        );
        SessionDescription { audio, video }
    }

    fn session_header(&self, name: &str) -> String {
        let host = self.config.destination_host.trim();
        let family = if host.contains(':') { "IP6" } else { "IP4" };
        format!(
            "v=0\r\no=- 0 0 IN {family} {host}\r\ns={name}\r\nc=IN {family} {host}\r\nt=0 0\r\n"
        )
    }

    fn frame_period(&self) -> Duration {
        Duration::from_secs(1) / self.settings.frame_rate.max(1)
    }
}

#[async_trait]
impl Camera for SimulatedCamera {
    async fn stream(&self, mut ctx: StreamContext) -> Result<(), CameraError> {
        if self.is_closed() {
            return Err(CameraError::Transport("camera is closed".to_string()));
        }
        if !ctx.announce(self.describe()) {
            return Ok(());
        }

        let mut ticker = tokio::time::interval(self.frame_period());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut frame: u64 = 0;

        loop {
            tokio::select! {
                biased;
                _ = ctx.stopped() => {
                    debug!(frames = frame, "Simulated camera stopped");
                    return Ok(());
                }
                _ = ticker.tick() => {
                    frame += 1;
                    if self.settings.drop_every > 0 && frame % self.settings.drop_every == 0 {
                        ctx.counters().record_dropped(1);
                    } else {
                        ctx.counters().record_sent(1);
                    }
                }
            }
        }
    }

    async fn close(&self) -> Result<(), CameraError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
