//! Conversions between protobuf messages and core types

use camera_provider_core::{
    CameraConfig, Error, FrameStats, RtpConfig, SessionDescription, StopOutcome, StreamStatus,
};
use tonic::{Code, Status};

use crate::generated as pb;

impl From<pb::CameraConfig> for CameraConfig {
    fn from(camera: pb::CameraConfig) -> Self {
        Self {
            id: camera.id,
            host: camera.host,
            port: camera.port,
            username: camera.username,
            password: camera.password,
            profile_token: camera.profile_token,
        }
    }
}

impl From<pb::RtpConfig> for RtpConfig {
    fn from(config: pb::RtpConfig) -> Self {
        Self {
            camera: config.camera.map(CameraConfig::from),
            destination_host: config.destination_host,
            video_port: config.video_port,
            audio_port: config.audio_port,
        }
    }
}

impl From<CameraConfig> for pb::CameraConfig {
    fn from(camera: CameraConfig) -> Self {
        Self {
            id: camera.id,
            host: camera.host,
            port: camera.port,
            username: camera.username,
            password: camera.password,
            profile_token: camera.profile_token,
        }
    }
}

impl From<RtpConfig> for pb::RtpConfig {
    fn from(config: RtpConfig) -> Self {
        Self {
            camera: config.camera.map(pb::CameraConfig::from),
            destination_host: config.destination_host,
            video_port: config.video_port,
            audio_port: config.audio_port,
        }
    }
}

impl From<SessionDescription> for pb::Sdp {
    fn from(description: SessionDescription) -> Self {
        Self {
            audio: description.audio,
            video: description.video,
        }
    }
}

fn counter(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

impl From<FrameStats> for pb::StreamInfo {
    fn from(stats: FrameStats) -> Self {
        Self {
            sdp: None,
            sent_frames: counter(stats.sent_frames),
            dropped_frames: counter(stats.dropped_frames),
        }
    }
}

impl From<StreamStatus> for pb::StreamInfo {
    fn from(status: StreamStatus) -> Self {
        match status {
            StreamStatus::Description(description) => Self {
                sdp: Some(description.into()),
                sent_frames: 0,
                dropped_frames: 0,
            },
            StreamStatus::Frames(stats) => stats.into(),
        }
    }
}

impl From<StopOutcome> for pb::Result {
    fn from(outcome: StopOutcome) -> Self {
        Self {
            successful: outcome.successful,
            error_kind: outcome.error_kind,
            message: outcome.message,
        }
    }
}

/// gRPC status code for an orchestration error
pub fn status_code(err: &Error) -> Code {
    match err {
        Error::InvalidConfiguration(_) => Code::InvalidArgument,
        Error::SessionAlreadyActive(_) => Code::AlreadyExists,
        Error::SessionLimitReached(_) => Code::ResourceExhausted,
        Error::StartupFailure(_) => Code::Unavailable,
        Error::RuntimeStreamFailure(_) => Code::Aborted,
        Error::StreamNotFound(_) => Code::NotFound,
        Error::CouldNotCloseStream(_) => Code::Internal,
    }
}

/// Convert an orchestration error into a gRPC status carrying its kind
pub fn to_status(err: &Error) -> Status {
    Status::new(status_code(err), format!("{}: {}", err.kind(), err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use camera_provider_core::SessionId;

    #[test]
    fn test_rtp_config_from_proto() {
        let proto = pb::RtpConfig {
            camera: Some(pb::CameraConfig {
                id: "camA".into(),
                host: "10.0.0.5".into(),
                port: 80,
                username: "admin".into(),
                password: "secret".into(),
                profile_token: "main".into(),
            }),
            destination_host: "10.0.0.9".into(),
            video_port: 5004,
            audio_port: 5006,
        };
        let config = RtpConfig::from(proto.clone());
        let camera = config.camera.as_ref().unwrap();
        assert_eq!(camera.profile_token, "main");
        assert_eq!(config.audio_port, 5006);
        assert_eq!(pb::RtpConfig::from(config), proto);
    }

    #[test]
    fn test_missing_camera_stays_missing() {
        let config = RtpConfig::from(pb::RtpConfig::default());
        assert!(config.camera.is_none());
    }

    #[test]
    fn test_stream_info() {
        let first: pb::StreamInfo = StreamStatus::Description(SessionDescription {
            audio: "a=".into(),
            video: "v=".into(),
        })
        .into();
        assert_eq!(first.sdp.map(|s| s.video), Some("v=".to_string()));

        let later: pb::StreamInfo = StreamStatus::Frames(FrameStats {
            sent_frames: 42,
            dropped_frames: u64::MAX,
        })
        .into();
        assert!(later.sdp.is_none());
        assert_eq!(later.sent_frames, 42);
        assert_eq!(later.dropped_frames, i64::MAX);
    }

    #[test]
    fn test_status_mapping() {
        let id: SessionId = "0".repeat(64).parse().unwrap();
        let cases = [
            (Error::InvalidConfiguration("x".into()), Code::InvalidArgument),
            (Error::SessionAlreadyActive(id.clone()), Code::AlreadyExists),
            (Error::SessionLimitReached(4), Code::ResourceExhausted),
            (Error::StartupFailure("x".into()), Code::Unavailable),
            (Error::RuntimeStreamFailure("x".into()), Code::Aborted),
            (Error::StreamNotFound(id), Code::NotFound),
            (Error::CouldNotCloseStream("x".into()), Code::Internal),
        ];
        for (err, code) in cases {
            let status = to_status(&err);
            assert_eq!(status.code(), code);
            assert!(status.message().starts_with(err.kind()));
        }
    }

    #[test]
    fn test_stop_outcome() {
        let result = pb::Result::from(StopOutcome::failed(&Error::CouldNotCloseStream(
            "device busy".into(),
        )));
        assert!(!result.successful);
        assert_eq!(result.error_kind, "CouldNotCloseStream");
        assert_eq!(result.message, "device busy");
    }
}
