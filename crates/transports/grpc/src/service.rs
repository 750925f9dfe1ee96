//! Camera service implementation
//!
//! `StreamRTP` reports startup failures as the RPC's status. Once the camera
//! has produced its session description, the status feed runs on its own
//! task and a failure while streaming arrives as the terminal item of the
//! response stream. `StopRTPStream` never fails at the RPC level; its
//! outcome is carried in the `Result` message.

use async_trait::async_trait;
use camera_provider_core::{RtpConfig, SinkClosed, StatusSink, StreamOrchestrator, StreamStatus};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status};
use tracing::{debug, info, warn};

use crate::adapters::to_status;
use crate::generated::{self as pb, camera_server::Camera};
use crate::metrics::ServiceMetrics;

/// Buffered status messages per stream
const STREAM_CHANNEL_CAPACITY: usize = 32;

/// Camera service implementation
#[derive(Clone)]
pub struct CameraProviderService {
    orchestrator: Arc<StreamOrchestrator>,
    metrics: Arc<ServiceMetrics>,
}

impl CameraProviderService {
    pub fn new(orchestrator: Arc<StreamOrchestrator>, metrics: Arc<ServiceMetrics>) -> Self {
        Self {
            orchestrator,
            metrics,
        }
    }

    pub fn orchestrator(&self) -> &Arc<StreamOrchestrator> {
        &self.orchestrator
    }
}

/// Status sink feeding a gRPC response stream
struct ResponseSink {
    tx: mpsc::Sender<Result<pb::StreamInfo, Status>>,
    metrics: Arc<ServiceMetrics>,
}

#[async_trait]
impl StatusSink for ResponseSink {
    async fn push(&mut self, status: StreamStatus) -> Result<(), SinkClosed> {
        self.tx
            .send(Ok(status.into()))
            .await
            .map_err(|_| SinkClosed)?;
        self.metrics.status_messages_total.inc();
        Ok(())
    }
}

#[tonic::async_trait]
impl Camera for CameraProviderService {
    type StreamRTPStream = ReceiverStream<Result<pb::StreamInfo, Status>>;

    async fn stream_rtp(
        &self,
        request: Request<pb::RtpConfig>,
    ) -> Result<Response<Self::StreamRTPStream>, Status> {
        let start = self.metrics.record_request_start();
        let config = RtpConfig::from(request.into_inner());

        let active = match self.orchestrator.start(config).await {
            Ok(active) => active,
            Err(e) => {
                self.metrics.record_request_end("StreamRTP", e.kind(), start);
                self.metrics.record_stream_error(e.kind());
                return Err(to_status(&e));
            }
        };
        self.metrics.record_request_end("StreamRTP", "ok", start);

        let session_id = active.id().clone();
        info!(session_id = %session_id, "Streaming camera status");

        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        let metrics = Arc::clone(&self.metrics);

        tokio::spawn(async move {
            metrics.record_stream_start();
            let mut sink = ResponseSink {
                tx: tx.clone(),
                metrics: Arc::clone(&metrics),
            };

            match active.run(&mut sink).await {
                Ok(end) => {
                    debug!(session_id = %session_id, reason = ?end, "Status stream finished")
                }
                Err(e) => {
                    metrics.record_stream_error(e.kind());
                    if tx.send(Err(to_status(&e))).await.is_err() {
                        debug!(
                            session_id = %session_id,
                            "Client disconnected before the failure was delivered"
                        );
                    }
                }
            }
            metrics.record_stream_end();
        });

        Ok(Response::new(ReceiverStream::new(rx)))
    }

    async fn stop_rtp_stream(
        &self,
        request: Request<pb::RtpConfig>,
    ) -> Result<Response<pb::Result>, Status> {
        let start = self.metrics.record_request_start();
        let config = RtpConfig::from(request.into_inner());

        let outcome = self.orchestrator.stop(&config).await;
        let label = if outcome.successful {
            "ok"
        } else {
            outcome.error_kind.as_str()
        };
        self.metrics.record_stop(label);
        self.metrics.record_request_end("StopRTPStream", label, start);

        Ok(Response::new(outcome.into()))
    }

    async fn snapshot(
        &self,
        request: Request<pb::CameraConfig>,
    ) -> Result<Response<pb::Image>, Status> {
        let start = self.metrics.record_request_start();
        let camera = request.into_inner();
        warn!(camera = %camera.id, "Snapshot capture is not supported, returning an empty image");
        self.metrics.record_request_end("Snapshot", "ok", start);
        Ok(Response::new(pb::Image::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camera_provider_core::camera::mock::{MockBehavior, MockCameraFactory};
    use camera_provider_core::StreamSettings;
    use tokio_stream::StreamExt;
    use tonic::Code;

    fn request() -> pb::RtpConfig {
        pb::RtpConfig {
            camera: Some(pb::CameraConfig {
                id: "camA".into(),
                host: "10.0.0.5".into(),
                port: 80,
                ..Default::default()
            }),
            destination_host: "10.0.0.9".into(),
            video_port: 5004,
            audio_port: 5006,
        }
    }

    fn service(behavior: MockBehavior) -> (CameraProviderService, Arc<MockCameraFactory>) {
        let factory = Arc::new(MockCameraFactory::new(behavior));
        let orchestrator = Arc::new(StreamOrchestrator::new(
            factory.clone(),
            StreamSettings::default(),
        ));
        let metrics = Arc::new(ServiceMetrics::with_default_registry().unwrap());
        (CameraProviderService::new(orchestrator, metrics), factory)
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_then_stop() {
        let (service, factory) = service(MockBehavior::default());
        let mut stream = service
            .stream_rtp(Request::new(request()))
            .await
            .unwrap()
            .into_inner();

        let first = stream.next().await.unwrap().unwrap();
        assert!(first.sdp.is_some());
        let second = stream.next().await.unwrap().unwrap();
        assert!(second.sdp.is_none());

        let result = service
            .stop_rtp_stream(Request::new(request()))
            .await
            .unwrap()
            .into_inner();
        assert!(result.successful);
        assert!(result.error_kind.is_empty());

        while let Some(item) = stream.next().await {
            assert!(item.is_ok());
        }
        assert_eq!(factory.last().unwrap().successful_closes(), 1);

        let again = service
            .stop_rtp_stream(Request::new(request()))
            .await
            .unwrap()
            .into_inner();
        assert!(!again.successful);
        assert_eq!(again.error_kind, "StreamNotFound");
        assert_eq!(again.message, "Camera stream not found");
    }

    #[tokio::test(start_paused = true)]
    async fn test_runtime_failure_is_terminal_item() {
        let (service, factory) = service(MockBehavior::default());
        let mut stream = service
            .stream_rtp(Request::new(request()))
            .await
            .unwrap()
            .into_inner();

        for _ in 0..3 {
            assert!(stream.next().await.unwrap().is_ok());
        }
        factory.last().unwrap().inject_failure("rtp socket closed");

        let status = stream.next().await.unwrap().unwrap_err();
        assert_eq!(status.code(), Code::Aborted);
        assert!(status.message().contains("rtp socket closed"));
        assert!(stream.next().await.is_none());
        assert!(service.orchestrator().registry().is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_startup_failure_is_rpc_status() {
        let (service, _factory) = service(MockBehavior {
            fail_before_handshake: Some("connection refused".into()),
            ..Default::default()
        });
        let status = service
            .stream_rtp(Request::new(request()))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::Unavailable);
        assert!(status.message().starts_with("StartupFailure"));
        assert!(service.orchestrator().registry().is_empty().await);
    }

    #[tokio::test]
    async fn test_invalid_configuration() {
        let (service, _factory) = service(MockBehavior::default());
        let status = service
            .stream_rtp(Request::new(pb::RtpConfig::default()))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::InvalidArgument);

        let result = service
            .stop_rtp_stream(Request::new(pb::RtpConfig::default()))
            .await
            .unwrap()
            .into_inner();
        assert!(!result.successful);
        assert_eq!(result.error_kind, "InvalidConfiguration");
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_stream_rejected() {
        let (service, _factory) = service(MockBehavior::default());
        let _first = service.stream_rtp(Request::new(request())).await.unwrap();
        let status = service
            .stream_rtp(Request::new(request()))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::AlreadyExists);
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_disconnect_releases_session() {
        let (service, factory) = service(MockBehavior::default());
        let mut stream = service
            .stream_rtp(Request::new(request()))
            .await
            .unwrap()
            .into_inner();
        assert!(stream.next().await.unwrap().is_ok());
        drop(stream);

        for _ in 0..10 {
            if service.orchestrator().registry().is_empty().await {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_secs(1)).await;
        }
        assert!(service.orchestrator().registry().is_empty().await);
        assert_eq!(factory.last().unwrap().successful_closes(), 1);
    }

    #[tokio::test]
    async fn test_snapshot_is_empty() {
        let (service, _factory) = service(MockBehavior::default());
        let image = service
            .snapshot(Request::new(pb::CameraConfig::default()))
            .await
            .unwrap()
            .into_inner();
        assert!(image.data.is_empty());
    }
}
