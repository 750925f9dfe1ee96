//! Scriptable camera for tests

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

use super::{Camera, CameraFactory, SessionDescription, StreamContext};
use crate::config::RtpConfig;
use crate::error::CameraError;

/// What a [`MockCamera`] does when driven
#[derive(Debug, Clone)]
pub struct MockBehavior {
    /// Fail inside `open`
    pub fail_open: Option<String>,
    /// Return this error from `stream` before announcing
    pub fail_before_handshake: Option<String>,
    /// Return `Ok` from `stream` without announcing
    pub exit_before_handshake: bool,
    /// Wait for the stop signal without announcing
    pub withhold_description: bool,
    /// Number of leading `close` calls that fail
    pub close_failures: usize,
    /// Interval between counted frames
    pub frame_period: Duration,
}

impl Default for MockBehavior {
    fn default() -> Self {
        Self {
            fail_open: None,
            fail_before_handshake: None,
            exit_before_handshake: false,
            withhold_description: false,
            close_failures: 0,
            frame_period: Duration::from_millis(10),
        }
    }
}

#[derive(Debug)]
pub struct MockCamera {
    behavior: MockBehavior,
    failure: Notify,
    failure_message: Mutex<Option<String>>,
    finish: Notify,
    close_calls: AtomicUsize,
    successful_closes: AtomicUsize,
}

impl MockCamera {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            failure: Notify::new(),
            failure_message: Mutex::new(None),
            finish: Notify::new(),
            close_calls: AtomicUsize::new(0),
            successful_closes: AtomicUsize::new(0),
        }
    }

    pub fn description() -> SessionDescription {
        SessionDescription {
            audio: "v=0\r\nm=audio 5006 RTP/AVP 0\r\n".to_string(),
            video: "v=0\r\nm=video 5004 RTP/AVP 96\r\n".to_string(),
        }
    }

    /// Make a running `stream` return a transport error
    pub fn inject_failure(&self, message: impl Into<String>) {
        *self.failure_message.lock() = Some(message.into());
        self.failure.notify_one();
    }

    /// Make a running `stream` return `Ok` as if the device hung up
    pub fn finish(&self) {
        self.finish.notify_one();
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    pub fn successful_closes(&self) -> usize {
        self.successful_closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Camera for MockCamera {
    async fn stream(&self, mut ctx: StreamContext) -> Result<(), CameraError> {
        if let Some(message) = &self.behavior.fail_before_handshake {
            return Err(CameraError::Connection(message.clone()));
        }
        if self.behavior.exit_before_handshake {
            return Ok(());
        }
        if self.behavior.withhold_description {
            ctx.stopped().await;
            return Ok(());
        }

        ctx.announce(Self::description());

        let mut ticker = tokio::time::interval(self.behavior.frame_period);
        loop {
            tokio::select! {
                biased;
                _ = ctx.stopped() => return Ok(()),
                _ = self.failure.notified() => {
                    let message = self
                        .failure_message
                        .lock()
                        .take()
                        .unwrap_or_else(|| "injected failure".to_string());
                    return Err(CameraError::Transport(message));
                }
                _ = self.finish.notified() => return Ok(()),
                _ = ticker.tick() => ctx.counters().record_sent(1),
            }
        }
    }

    async fn close(&self) -> Result<(), CameraError> {
        let call = self.close_calls.fetch_add(1, Ordering::SeqCst);
        if call < self.behavior.close_failures {
            return Err(CameraError::Close("device busy".to_string()));
        }
        self.successful_closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Factory that records every camera it hands out
#[derive(Debug, Default)]
pub struct MockCameraFactory {
    behavior: MockBehavior,
    opened: Mutex<Vec<Arc<MockCamera>>>,
}

impl MockCameraFactory {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            opened: Mutex::new(Vec::new()),
        }
    }

    pub fn opened(&self) -> Vec<Arc<MockCamera>> {
        self.opened.lock().clone()
    }

    pub fn last(&self) -> Option<Arc<MockCamera>> {
        self.opened.lock().last().cloned()
    }
}

impl CameraFactory for MockCameraFactory {
    fn open(&self, _config: &RtpConfig) -> Result<Arc<dyn Camera>, CameraError> {
        if let Some(message) = &self.behavior.fail_open {
            return Err(CameraError::Connection(message.clone()));
        }
        let camera = Arc::new(MockCamera::new(self.behavior.clone()));
        self.opened.lock().push(Arc::clone(&camera));
        Ok(camera)
    }
}
