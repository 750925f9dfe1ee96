//! gRPC transport for the camera provider
//!
//! Exposes [`camera_provider_core`] session orchestration as the `Camera`
//! gRPC service:
//!
//! - `StreamRTP` starts a session and streams its status feed
//! - `StopRTPStream` tears a session down and reports the outcome as data
//! - `Snapshot` returns an empty image
//!
//! The server speaks plain gRPC over HTTP/2 and gRPC-Web over HTTP/1.1, with
//! optional TLS.

pub mod adapters;
pub mod config;
pub mod metrics;
pub mod server;
pub mod service;

/// Code generated from `proto/camera_provider.proto`
pub mod generated {
    tonic::include_proto!("camera_provider.v1");
}

pub use config::{ConfigError, ServiceConfig, TlsConfig};
pub use metrics::ServiceMetrics;
pub use server::{ProviderServer, ServerError};
pub use service::CameraProviderService;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Install the global tracing subscriber.
///
/// Honors `RUST_LOG` and falls back to `info`. Emits JSON lines when `json`
/// is set, human-readable output otherwise. Does nothing if a subscriber is
/// already installed.
pub fn init_tracing(json: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = if json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };

    if installed.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}
