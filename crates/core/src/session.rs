//! Camera session state

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::camera::{Camera, FrameCounters, FrameStats};
use crate::config::RtpConfig;
use crate::error::CameraError;
use crate::identity::SessionId;

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Registered, waiting for the camera's session description
    Starting,
    /// Session description delivered, status feed running
    Streaming,
    /// An explicit stop is closing the camera
    Stopping,
    /// Camera released
    Closed,
}

/// One live streaming session
pub struct CameraSession {
    id: SessionId,
    config: RtpConfig,
    camera: Arc<dyn Camera>,
    counters: Arc<FrameCounters>,
    state: Mutex<SessionState>,
    /// Serialises closers and records whether the camera has been released
    closed: tokio::sync::Mutex<bool>,
    stop: watch::Sender<bool>,
    created_at: Instant,
}

impl CameraSession {
    pub fn new(id: SessionId, config: RtpConfig, camera: Arc<dyn Camera>) -> Self {
        let (stop, _) = watch::channel(false);
        Self {
            id,
            config,
            camera,
            counters: Arc::new(FrameCounters::new()),
            state: Mutex::new(SessionState::Starting),
            closed: tokio::sync::Mutex::new(false),
            stop,
            created_at: Instant::now(),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn config(&self) -> &RtpConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    /// Move to `next`. A closed session stays closed.
    pub(crate) fn set_state(&self, next: SessionState) {
        let mut state = self.state.lock();
        if *state == next || *state == SessionState::Closed {
            return;
        }
        debug!(
            session_id = %self.id.short(),
            from = ?*state,
            to = ?next,
            "Session state transition"
        );
        *state = next;
    }

    pub fn counters(&self) -> Arc<FrameCounters> {
        Arc::clone(&self.counters)
    }

    pub fn stats(&self) -> FrameStats {
        self.counters.snapshot()
    }

    pub(crate) fn camera(&self) -> Arc<dyn Camera> {
        Arc::clone(&self.camera)
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Ask the camera and the status feed to wind down
    pub fn cancel(&self) {
        self.stop.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.stop.borrow()
    }

    pub fn subscribe_stop(&self) -> watch::Receiver<bool> {
        self.stop.subscribe()
    }

    /// Release the camera.
    ///
    /// Concurrent callers are serialised. Once a close has succeeded every
    /// further call returns `Ok` without touching the camera. A failed close
    /// leaves the session open so it can be retried.
    pub async fn close(&self) -> Result<(), CameraError> {
        let mut closed = self.closed.lock().await;
        if *closed {
            debug!(session_id = %self.id.short(), "Idempotent: already closed");
            return Ok(());
        }

        self.camera.close().await?;

        *closed = true;
        self.set_state(SessionState::Closed);
        info!(session_id = %self.id, "Camera session closed");
        Ok(())
    }

    pub async fn is_closed(&self) -> bool {
        *self.closed.lock().await
    }
}

impl fmt::Debug for CameraSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CameraSession")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("stats", &self.stats())
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::mock::{MockBehavior, MockCamera};
    use crate::config::CameraConfig;

    fn session_with(behavior: MockBehavior) -> (CameraSession, Arc<MockCamera>) {
        let config = RtpConfig::new(
            CameraConfig::new("camA", "10.0.0.5", 80),
            "10.0.0.9",
            5004,
            5006,
        );
        let id = SessionId::derive(&config).unwrap();
        let camera = Arc::new(MockCamera::new(behavior));
        let session = CameraSession::new(id, config, camera.clone());
        (session, camera)
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (session, camera) = session_with(MockBehavior::default());
        assert_eq!(session.state(), SessionState::Starting);

        session.close().await.unwrap();
        session.close().await.unwrap();
        session.close().await.unwrap();

        assert_eq!(camera.close_calls(), 1);
        assert_eq!(session.state(), SessionState::Closed);
        assert!(session.is_closed().await);
    }

    #[tokio::test]
    async fn test_failed_close_can_be_retried() {
        let (session, camera) = session_with(MockBehavior {
            close_failures: 1,
            ..Default::default()
        });
        session.set_state(SessionState::Streaming);

        assert!(session.close().await.is_err());
        assert_eq!(session.state(), SessionState::Streaming);
        assert!(!session.is_closed().await);

        session.close().await.unwrap();
        assert_eq!(camera.close_calls(), 2);
        assert_eq!(camera.successful_closes(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_closers_release_once() {
        let (session, camera) = session_with(MockBehavior::default());
        let session = Arc::new(session);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let session = Arc::clone(&session);
                tokio::spawn(async move { session.close().await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(camera.successful_closes(), 1);
    }

    #[test]
    fn test_closed_state_is_terminal() {
        let (session, _camera) = session_with(MockBehavior::default());
        session.set_state(SessionState::Closed);
        session.set_state(SessionState::Streaming);
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_cancel_reaches_late_subscribers() {
        let (session, _camera) = session_with(MockBehavior::default());
        session.cancel();
        let mut stop = session.subscribe_stop();
        assert!(*stop.borrow_and_update());
        assert!(session.is_cancelled());
    }
}
