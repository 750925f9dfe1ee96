//! Camera Provider Core
//!
//! Transport-agnostic lifecycle management for camera streaming sessions.
//! A stream request is turned into a [`SessionId`], registered in the
//! process-wide [`SessionRegistry`], started through a [`Camera`] backend,
//! and then fed to the caller as a sequence of [`StreamStatus`] updates
//! until the caller, an explicit stop, or the camera ends it.
//!
//! # Architecture
//!
//! ```text
//! transport (gRPC, ...)
//!        |
//!        v
//! StreamOrchestrator --start--> ActiveStream --run--> StatusSink
//!        |       \                    |
//!      stop       SessionRegistry <---+ (deregister on exit)
//!        |
//!        v
//! CameraSession::close --> Camera::close (at most once)
//! ```
//!
//! The crate has no knowledge of the wire protocol. Transports implement
//! [`StatusSink`] for their response channel and map [`Error`] onto their
//! own status codes.

pub mod camera;
pub mod config;
pub mod error;
pub mod identity;
pub mod orchestrator;
pub mod registry;
pub mod session;
pub mod settings;
pub mod teardown;

pub use camera::{
    Camera, CameraFactory, FrameCounters, FrameStats, SessionDescription, StreamContext,
};
pub use config::{CameraConfig, RtpConfig};
pub use error::{CameraError, Error, Result};
pub use identity::SessionId;
pub use orchestrator::{
    ActiveStream, SinkClosed, StatusSink, StreamEnd, StreamOrchestrator, StreamStatus,
};
pub use registry::SessionRegistry;
pub use session::{CameraSession, SessionState};
pub use settings::StreamSettings;
pub use teardown::StopOutcome;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
