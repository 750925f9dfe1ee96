//! Stream orchestration
//!
//! [`StreamOrchestrator::start`] registers a session, spawns the camera's
//! stream procedure and waits for its session description. The returned
//! [`ActiveStream`] then drives the status feed: the description first,
//! frame counters on every tick after that, until the camera finishes, the
//! session is stopped, or the caller goes away. Every exit path releases
//! the camera and deregisters the session.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::camera::{CameraFactory, FrameStats, SessionDescription, StreamContext};
use crate::config::RtpConfig;
use crate::error::{CameraError, Error, Result};
use crate::identity::SessionId;
use crate::registry::SessionRegistry;
use crate::session::{CameraSession, SessionState};
use crate::settings::StreamSettings;

type CameraTask = JoinHandle<std::result::Result<(), CameraError>>;

/// One message of the status feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamStatus {
    /// First message of every feed
    Description(SessionDescription),
    /// Every later message
    Frames(FrameStats),
}

/// The receiving end of a status feed went away
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("status receiver closed")]
pub struct SinkClosed;

/// Destination of a status feed
#[async_trait]
pub trait StatusSink: Send {
    async fn push(&mut self, status: StreamStatus) -> std::result::Result<(), SinkClosed>;
}

#[async_trait]
impl StatusSink for mpsc::Sender<StreamStatus> {
    async fn push(&mut self, status: StreamStatus) -> std::result::Result<(), SinkClosed> {
        self.send(status).await.map_err(|_| SinkClosed)
    }
}

/// Why a status feed ended without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// The session was stopped explicitly
    Stopped,
    /// A push to the caller failed
    CallerDisconnected,
    /// The camera's stream procedure returned on its own
    CameraFinished,
    /// The session reached its maximum duration
    DurationElapsed,
}

/// Starts and stops camera sessions against a shared registry
pub struct StreamOrchestrator {
    registry: Arc<SessionRegistry>,
    factory: Arc<dyn CameraFactory>,
    settings: StreamSettings,
}

impl StreamOrchestrator {
    pub fn new(factory: Arc<dyn CameraFactory>, settings: StreamSettings) -> Self {
        Self {
            registry: Arc::new(SessionRegistry::with_limit(settings.max_sessions)),
            factory,
            settings,
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn settings(&self) -> &StreamSettings {
        &self.settings
    }

    /// Start a session and wait for its session description.
    ///
    /// Fails with `InvalidConfiguration` before anything is registered,
    /// `SessionAlreadyActive` when the id is live, and `StartupFailure` when
    /// the camera fails or stays silent past the handshake timeout. A failed
    /// start leaves no registry entry behind.
    pub async fn start(&self, config: RtpConfig) -> Result<ActiveStream> {
        let id = SessionId::derive(&config)?;

        if self.registry.contains(&id).await {
            warn!(session_id = %id, "Rejected start: session already active");
            return Err(Error::SessionAlreadyActive(id));
        }

        let camera = self
            .factory
            .open(&config)
            .map_err(|e| Error::StartupFailure(e.to_string()))?;
        let session = Arc::new(CameraSession::new(id.clone(), config, camera));
        let mut guard = StartupGuard {
            session: Some(Arc::clone(&session)),
            registry: Arc::clone(&self.registry),
            task: None,
        };

        if let Err(e) = self.registry.register(Arc::clone(&session)).await {
            warn!(session_id = %id, kind = e.kind(), "Rejected start: {}", e);
            if let Err(close_err) = session.close().await {
                warn!(session_id = %id, error = %close_err, "Failed to release rejected camera");
            }
            guard.disarm();
            return Err(e);
        }
        let rtp = session.config();
        info!(
            session_id = %id,
            destination = %rtp.destination_host,
            video_port = rtp.video_port,
            audio_port = rtp.audio_port,
            "Camera session registered"
        );

        let (handshake_tx, handshake_rx) = oneshot::channel();
        let ctx = StreamContext::new(handshake_tx, session.counters(), session.subscribe_stop());
        let camera = session.camera();
        let mut task: CameraTask = tokio::spawn(async move { camera.stream(ctx).await });
        guard.task = Some(task.abort_handle());

        let timeout = self.settings.handshake_timeout();
        let reason = match tokio::time::timeout(timeout, handshake_rx).await {
            Ok(Ok(description)) => {
                session.set_state(SessionState::Streaming);
                info!(session_id = %id, "Camera stream negotiated");
                debug!(
                    session_id = %id,
                    video_len = description.video.len(),
                    audio_len = description.audio.len(),
                    "Session description received"
                );
                guard.disarm();
                return Ok(ActiveStream {
                    session,
                    description,
                    task,
                    registry: Arc::clone(&self.registry),
                    settings: self.settings.clone(),
                });
            }
            // The handshake sender lives in the camera task, so the task has ended.
            Ok(Err(_)) => match wait_for_task(&mut task, self.settings.shutdown_grace()).await {
                Some(Ok(Ok(()))) => {
                    "camera stream ended before the session description was ready".to_string()
                }
                Some(Ok(Err(e))) => e.to_string(),
                Some(Err(join_err)) => format!("camera task failed: {}", join_err),
                None => "camera dropped the handshake without finishing".to_string(),
            },
            Err(_) => format!("no session description within {:?}", timeout),
        };

        warn!(session_id = %id, reason = %reason, "Stream startup failed");
        session.cancel();
        if !task.is_finished() {
            wind_down(task, self.settings.shutdown_grace(), &id).await;
        }
        if let Err(e) = session.close().await {
            warn!(session_id = %id, error = %e, "Failed to release camera after startup failure");
        }
        self.registry.remove_if_same(&session).await;
        guard.disarm();
        Err(Error::StartupFailure(reason))
    }

    /// Stop every session, for process shutdown
    pub async fn shutdown(&self) {
        let sessions = self.registry.drain().await;
        let count = sessions.len();
        for session in sessions {
            session.cancel();
            if let Err(e) = session.close().await {
                warn!(
                    session_id = %session.id(),
                    error = %e,
                    "Failed to close camera during shutdown"
                );
            }
        }
        info!(count, "All camera sessions stopped");
    }
}

/// Releases the session of a `start` that is dropped before it returns
struct StartupGuard {
    session: Option<Arc<CameraSession>>,
    registry: Arc<SessionRegistry>,
    task: Option<AbortHandle>,
}

impl StartupGuard {
    fn disarm(&mut self) {
        self.session = None;
        self.task = None;
    }
}

impl Drop for StartupGuard {
    fn drop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        warn!(
            session_id = %session.id(),
            "Start abandoned before completing, releasing session"
        );
        session.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
        }

        let registry = Arc::clone(&self.registry);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = session.close().await {
                        warn!(
                            session_id = %session.id(),
                            error = %e,
                            "Failed to release abandoned camera"
                        );
                    }
                    registry.remove_if_same(&session).await;
                });
            }
            Err(_) => debug!(
                session_id = %session.id().short(),
                "No runtime left to release the abandoned session"
            ),
        }
    }
}

/// A negotiated session whose status feed has not run yet
///
/// Dropping it without calling [`ActiveStream::run`] leaves the session
/// registered until it is stopped explicitly.
#[must_use = "an active stream stays registered until it is run or stopped"]
pub struct ActiveStream {
    session: Arc<CameraSession>,
    description: SessionDescription,
    task: CameraTask,
    registry: Arc<SessionRegistry>,
    settings: StreamSettings,
}

impl std::fmt::Debug for ActiveStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveStream")
            .field("session", &self.session)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

impl ActiveStream {
    pub fn id(&self) -> &SessionId {
        self.session.id()
    }

    pub fn description(&self) -> &SessionDescription {
        &self.description
    }

    pub fn session(&self) -> &Arc<CameraSession> {
        &self.session
    }

    /// Push the status feed into `sink` until the session ends, then clean up.
    ///
    /// Returns `RuntimeStreamFailure` when the camera fails while streaming.
    /// Every other ending is reported as a [`StreamEnd`].
    pub async fn run<S>(self, sink: &mut S) -> Result<StreamEnd>
    where
        S: StatusSink + ?Sized,
    {
        let Self {
            session,
            description,
            mut task,
            registry,
            settings,
        } = self;
        let id = session.id().clone();

        let mut camera_done = false;
        let outcome = pump(
            &session,
            description,
            &mut task,
            &mut camera_done,
            &settings,
            sink,
        )
        .await;

        let elapsed_ms = session.age().as_millis() as u64;
        match &outcome {
            Ok(end) => info!(session_id = %id, reason = ?end, elapsed_ms, "Status feed ended"),
            Err(e) => error!(session_id = %id, error = %e, elapsed_ms, "Camera stream failed"),
        }

        session.cancel();
        if !camera_done {
            wind_down(task, settings.shutdown_grace(), &id).await;
        }
        if let Err(e) = session.close().await {
            warn!(session_id = %id, error = %e, "Failed to close camera after stream end");
        }
        if registry.remove_if_same(&session).await {
            info!(session_id = %id, "Camera session deregistered");
        }

        outcome
    }
}

async fn pump<S>(
    session: &CameraSession,
    description: SessionDescription,
    task: &mut CameraTask,
    camera_done: &mut bool,
    settings: &StreamSettings,
    sink: &mut S,
) -> Result<StreamEnd>
where
    S: StatusSink + ?Sized,
{
    if sink.push(StreamStatus::Description(description)).await.is_err() {
        return Ok(StreamEnd::CallerDisconnected);
    }

    let mut stop = session.subscribe_stop();
    let mut ticker = tokio::time::interval(settings.status_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let expiry = async {
        match settings.max_session_duration() {
            Some(limit) => tokio::time::sleep(limit).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(expiry);

    loop {
        tokio::select! {
            biased;
            _ = stop_requested(&mut stop) => return Ok(StreamEnd::Stopped),
            joined = &mut *task => {
                *camera_done = true;
                return match joined {
                    Ok(Ok(())) => Ok(StreamEnd::CameraFinished),
                    Ok(Err(e)) => Err(Error::RuntimeStreamFailure(e.to_string())),
                    Err(join_err) => Err(Error::RuntimeStreamFailure(format!(
                        "camera task failed: {}",
                        join_err
                    ))),
                };
            }
            _ = &mut expiry => return Ok(StreamEnd::DurationElapsed),
            _ = ticker.tick() => {
                let stats = session.stats();
                if sink.push(StreamStatus::Frames(stats)).await.is_err() {
                    return Ok(StreamEnd::CallerDisconnected);
                }
                debug!(
                    session_id = %session.id().short(),
                    sent = stats.sent_frames,
                    dropped = stats.dropped_frames,
                    "Pushed frame counters"
                );
            }
        }
    }
}

async fn stop_requested(stop: &mut watch::Receiver<bool>) {
    let _ = stop.wait_for(|stopped| *stopped).await;
}

async fn wait_for_task(
    task: &mut CameraTask,
    grace: Duration,
) -> Option<std::result::Result<std::result::Result<(), CameraError>, tokio::task::JoinError>> {
    tokio::time::timeout(grace, task).await.ok()
}

/// Give a cancelled camera task `grace` to return, then abort it
async fn wind_down(mut task: CameraTask, grace: Duration, id: &SessionId) {
    match wait_for_task(&mut task, grace).await {
        Some(Ok(Err(e))) => debug!(
            session_id = %id.short(),
            error = %e,
            "Camera returned error while stopping"
        ),
        Some(_) => {}
        None => {
            warn!(session_id = %id, "Camera task did not stop in time, aborting");
            task.abort();
        }
    }
}
