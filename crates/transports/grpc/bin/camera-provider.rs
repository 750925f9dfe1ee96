//! Camera provider server binary entry point
//!
//! Starts the `Camera` gRPC service backed by the simulated camera.
//!
//! # Usage
//!
//! ```bash
//! # Start with defaults (0.0.0.0:5390, plaintext)
//! cargo run --bin camera-provider
//!
//! # Custom address
//! cargo run --bin camera-provider -- --host 127.0.0.1 --port 6000
//!
//! # TLS
//! cargo run --bin camera-provider -- --tls --cert-file cert.pem --key-file key.pem
//!
//! # From a config file
//! cargo run --bin camera-provider -- --config provider.toml
//! ```
//!
//! # Environment Variables
//!
//! - `CAMERA_PROVIDER_CONFIG`: Path of a TOML config file
//! - `CAMERA_PROVIDER_HOST`: Host to bind (default: `0.0.0.0`)
//! - `CAMERA_PROVIDER_PORT`: Port to bind (default: `5390`)
//! - `CAMERA_PROVIDER_TLS_CERT` / `CAMERA_PROVIDER_TLS_KEY`: Enable TLS with these PEM files
//! - `CAMERA_PROVIDER_JSON_LOGS`: Enable JSON structured logging (default: `false`)
//! - `CAMERA_PROVIDER_STATUS_INTERVAL_MS`: Interval between frame counter updates (default: `1000`)
//! - `CAMERA_PROVIDER_MAX_SESSIONS`: Maximum concurrent sessions (default: unlimited)
//! - `RUST_LOG`: Logging level (default: `info`, options: `trace`, `debug`, `info`, `warn`, `error`)
//!
//! Command-line flags take precedence over the config file and environment.

use anyhow::Context;
use camera_provider_grpc::{init_tracing, ConfigError, ProviderServer, ServiceConfig, TlsConfig};
use clap::Parser;
use std::path::PathBuf;
use tokio::signal;
use tracing::{error, info, warn};

#[derive(Debug, Parser)]
#[command(name = "camera-provider", version, about = "gRPC camera streaming provider")]
struct Args {
    /// TOML configuration file
    #[arg(long, env = "CAMERA_PROVIDER_CONFIG")]
    config: Option<PathBuf>,

    /// Host to bind
    #[arg(long)]
    host: Option<String>,

    /// Port to bind
    #[arg(long)]
    port: Option<u16>,

    /// Serve over TLS
    #[arg(long)]
    tls: bool,

    /// TLS certificate (PEM)
    #[arg(long)]
    cert_file: Option<PathBuf>,

    /// TLS private key (PEM)
    #[arg(long)]
    key_file: Option<PathBuf>,

    /// Emit JSON log lines
    #[arg(long)]
    json_logs: bool,
}

impl Args {
    fn apply(&self, config: &mut ServiceConfig) -> Result<(), ConfigError> {
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if self.json_logs {
            config.json_logging = true;
        }
        if self.tls {
            let existing = config.tls.take();
            let cert_file = self
                .cert_file
                .clone()
                .or_else(|| existing.as_ref().map(|t| t.cert_file.clone()));
            let key_file = self
                .key_file
                .clone()
                .or_else(|| existing.as_ref().map(|t| t.key_file.clone()));
            match (cert_file, key_file) {
                (Some(cert_file), Some(key_file)) => {
                    config.tls = Some(TlsConfig {
                        cert_file,
                        key_file,
                    })
                }
                _ => {
                    return Err(ConfigError::Invalid(
                        "--tls requires --cert-file and --key-file".to_string(),
                    ))
                }
            }
        }
        Ok(())
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("camera-provider-worker")
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    runtime.block_on(async_main(args))
}

async fn async_main(args: Args) -> anyhow::Result<()> {
    let mut config = ServiceConfig::load(args.config.as_deref())?;
    args.apply(&mut config)?;
    config.validate()?;

    init_tracing(config.json_logging);

    info!(
        version = camera_provider_grpc::VERSION,
        "Camera provider starting"
    );
    info!(
        bind_address = %config.bind_address(),
        tls = config.tls.is_some(),
        status_interval_ms = config.stream.status_interval_ms,
        handshake_timeout_ms = config.stream.handshake_timeout_ms,
        max_sessions = config.stream.max_sessions,
        json_logging = config.json_logging,
        "Configuration loaded"
    );

    let server = ProviderServer::with_simulated_cameras(config)?;

    match server.serve_with_shutdown(shutdown_signal()).await {
        Ok(()) => {
            info!("Server shut down gracefully");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Server error");
            Err(e.into())
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received, initiating graceful shutdown...");
}
