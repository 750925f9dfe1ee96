//! Tonic server setup and configuration for the Camera service
//!
//! Wraps the service with gRPC-Web and CORS layers, applies keepalive and
//! connection settings, optionally enables TLS, and closes every remaining
//! camera session once the server has stopped.

use camera_provider_core::camera::simulated::SimulatedCameraFactory;
use camera_provider_core::StreamOrchestrator;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::service::LayerExt as _;
use tonic::transport::server::Router;
use tonic::transport::{Identity, Server, ServerTlsConfig};
use tracing::{info, warn};

use crate::config::{ConfigError, ServiceConfig, TlsConfig};
use crate::generated::camera_server::CameraServer;
use crate::metrics::ServiceMetrics;
use crate::service::CameraProviderService;

/// Largest accepted request message
const MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// Server errors
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

/// gRPC server for the Camera service
pub struct ProviderServer {
    config: ServiceConfig,
    metrics: Arc<ServiceMetrics>,
    orchestrator: Arc<StreamOrchestrator>,
}

impl ProviderServer {
    /// Create a server around an existing orchestrator
    pub fn new(
        config: ServiceConfig,
        orchestrator: Arc<StreamOrchestrator>,
    ) -> Result<Self, ServerError> {
        let metrics = Arc::new(ServiceMetrics::with_default_registry()?);
        Ok(Self {
            config,
            metrics,
            orchestrator,
        })
    }

    /// Create a server backed by simulated cameras
    pub fn with_simulated_cameras(config: ServiceConfig) -> Result<Self, ServerError> {
        let factory = Arc::new(SimulatedCameraFactory::new(config.simulator.clone()));
        let orchestrator = Arc::new(StreamOrchestrator::new(factory, config.stream.clone()));
        Self::new(config, orchestrator)
    }

    /// Get metrics for use in service implementations
    pub fn metrics(&self) -> Arc<ServiceMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn orchestrator(&self) -> Arc<StreamOrchestrator> {
        Arc::clone(&self.orchestrator)
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Build and run the server until the process is killed
    pub async fn serve(self) -> Result<(), ServerError> {
        self.serve_with_shutdown(std::future::pending()).await
    }

    /// Build and run the server until `signal` resolves
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send,
    {
        let addr = self.config.socket_addr()?;
        let router = self.router()?;

        info!("Listening on {}", addr);
        let served = router
            .serve_with_shutdown(addr, self.close_sessions_on(signal))
            .await;
        self.finish(served).await
    }

    /// Run the server on an already bound listener until `signal` resolves
    pub async fn serve_with_incoming_shutdown<F>(
        self,
        incoming: TcpListenerStream,
        signal: F,
    ) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send,
    {
        let router = self.router()?;
        let served = router
            .serve_with_incoming_shutdown(incoming, self.close_sessions_on(signal))
            .await;
        self.finish(served).await
    }

    /// Graceful shutdown waits for open responses, so live sessions are
    /// cancelled as soon as `signal` fires to let their streams end.
    fn close_sessions_on<F>(&self, signal: F) -> impl Future<Output = ()> + Send
    where
        F: Future<Output = ()> + Send,
    {
        let orchestrator = Arc::clone(&self.orchestrator);
        async move {
            signal.await;
            info!("Shutdown requested, closing camera sessions");
            orchestrator.shutdown().await;
        }
    }

    async fn finish(self, served: Result<(), tonic::transport::Error>) -> Result<(), ServerError> {
        // Sessions started while draining
        self.orchestrator.shutdown().await;
        info!("gRPC server stopped");
        served?;
        Ok(())
    }

    fn router(&self) -> Result<Router, ServerError> {
        let service = CameraProviderService::new(
            Arc::clone(&self.orchestrator),
            Arc::clone(&self.metrics),
        );

        // Wrap the service with gRPC-Web and CORS support using tower ServiceBuilder
        let service = tower::ServiceBuilder::new()
            .layer(tower_http::cors::CorsLayer::permissive())
            .layer(tonic_web::GrpcWebLayer::new())
            .into_inner()
            .named_layer(
                CameraServer::new(service)
                    .max_decoding_message_size(MAX_MESSAGE_SIZE),
            );

        let mut builder = Server::builder();
        if let Some(tls) = &self.config.tls {
            builder = builder.tls_config(ServerTlsConfig::new().identity(load_identity(tls)?))?;
            info!(cert_file = %tls.cert_file.display(), "TLS enabled");
        }

        let router = builder
            // Allow many concurrent requests per connection
            .concurrency_limit_per_connection(256)
            // TCP keepalive to detect dead connections
            .tcp_keepalive(Some(Duration::from_secs(60)))
            .tcp_nodelay(true)
            // HTTP/2 keepalive ping to keep long-lived streams alive
            .http2_keepalive_interval(Some(Duration::from_secs(30)))
            .http2_keepalive_timeout(Some(Duration::from_secs(10)))
            // Enable HTTP/1.1 for gRPC-Web
            .accept_http1(true)
            // Tracing
            .trace_fn(|_| tracing::info_span!("grpc_request"))
            .add_service(service);

        Ok(router)
    }

    /// Expose Prometheus metrics in the text exposition format
    pub fn metrics_text(&self) -> String {
        match self.metrics.render() {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Failed to render metrics");
                String::new()
            }
        }
    }
}

fn load_identity(tls: &TlsConfig) -> Result<Identity, ConfigError> {
    let cert = std::fs::read(&tls.cert_file)
        .map_err(|e| ConfigError::Io(format!("{}: {}", tls.cert_file.display(), e)))?;
    let key = std::fs::read(&tls.key_file)
        .map_err(|e| ConfigError::Io(format!("{}: {}", tls.key_file.display(), e)))?;
    Ok(Identity::from_pem(cert, key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_server_creation() {
        let server = ProviderServer::with_simulated_cameras(ServiceConfig::default());
        assert!(server.is_ok());
    }

    #[test]
    fn test_metrics_access() {
        let server = ProviderServer::with_simulated_cameras(ServiceConfig::default()).unwrap();
        let metrics = server.metrics();

        metrics.active_streams.inc();
        assert_eq!(metrics.active_streams.get(), 1);
    }

    #[test]
    fn test_metrics_text_export() {
        let server = ProviderServer::with_simulated_cameras(ServiceConfig::default()).unwrap();
        server.metrics().status_messages_total.inc();

        let text = server.metrics_text();
        assert!(text.contains("camera_provider_status_messages_total"));
    }

    #[test]
    fn test_missing_tls_files() {
        let config = ServiceConfig {
            tls: Some(TlsConfig {
                cert_file: PathBuf::from("/nonexistent/cert.pem"),
                key_file: PathBuf::from("/nonexistent/key.pem"),
            }),
            ..Default::default()
        };
        let server = ProviderServer::with_simulated_cameras(config).unwrap();
        assert!(matches!(
            server.router(),
            Err(ServerError::Config(ConfigError::Io(_)))
        ));
    }

    #[tokio::test]
    async fn test_invalid_bind_address() {
        let config = ServiceConfig {
            host: "not a host".to_string(),
            ..Default::default()
        };
        let server = ProviderServer::with_simulated_cameras(config).unwrap();
        assert!(matches!(
            server.serve().await,
            Err(ServerError::Config(ConfigError::Invalid(_)))
        ));
    }
}
