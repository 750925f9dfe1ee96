//! Camera capability
//!
//! A [`Camera`] negotiates a media session with a device, announces the
//! resulting SDP through its [`StreamContext`], and then keeps media flowing
//! while it counts frames. The orchestrator owns every instance through a
//! [`CameraSession`](crate::CameraSession) and releases it with a single
//! [`Camera::close`].

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{oneshot, watch};

use crate::config::RtpConfig;
use crate::error::CameraError;

pub mod simulated;

#[cfg(any(test, feature = "test-util"))]
pub mod mock;

/// Negotiated SDP for the audio and video tracks
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionDescription {
    pub audio: String,
    pub video: String,
}

/// Snapshot of a session's frame counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub sent_frames: u64,
    pub dropped_frames: u64,
}

/// Monotonic frame counters shared between a camera and its session
#[derive(Debug, Default)]
pub struct FrameCounters {
    sent: AtomicU64,
    dropped: AtomicU64,
}

impl FrameCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_sent(&self, frames: u64) {
        self.sent.fetch_add(frames, Ordering::Relaxed);
    }

    pub fn record_dropped(&self, frames: u64) {
        self.dropped.fetch_add(frames, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> FrameStats {
        FrameStats {
            sent_frames: self.sent.load(Ordering::Relaxed),
            dropped_frames: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Everything a camera needs while streaming
pub struct StreamContext {
    handshake: Option<oneshot::Sender<SessionDescription>>,
    counters: Arc<FrameCounters>,
    stop: watch::Receiver<bool>,
}

impl StreamContext {
    pub fn new(
        handshake: oneshot::Sender<SessionDescription>,
        counters: Arc<FrameCounters>,
        stop: watch::Receiver<bool>,
    ) -> Self {
        Self {
            handshake: Some(handshake),
            counters,
            stop,
        }
    }

    /// Hand the negotiated session description to the waiting caller.
    ///
    /// Only the first call delivers anything. Returns `false` when the
    /// description was already sent or nobody is waiting any more.
    pub fn announce(&mut self, description: SessionDescription) -> bool {
        match self.handshake.take() {
            Some(tx) => tx.send(description).is_ok(),
            None => false,
        }
    }

    pub fn counters(&self) -> &FrameCounters {
        &self.counters
    }

    pub fn is_stopped(&self) -> bool {
        *self.stop.borrow()
    }

    /// Resolves once the session is asked to stop
    pub async fn stopped(&mut self) {
        // A dropped sender means the session itself is gone.
        let _ = self.stop.wait_for(|stopped| *stopped).await;
    }
}

/// A streaming camera backend
#[async_trait]
pub trait Camera: Send + Sync {
    /// Negotiate the media session and stream until the context is stopped.
    ///
    /// Must call [`StreamContext::announce`] once the SDP is known. Returning
    /// before that is treated as a startup failure, returning after it ends
    /// the session.
    async fn stream(&self, ctx: StreamContext) -> Result<(), CameraError>;

    /// Release the device. Called at most once successfully per session.
    async fn close(&self) -> Result<(), CameraError>;
}

/// Creates camera instances for stream requests
pub trait CameraFactory: Send + Sync {
    fn open(&self, config: &RtpConfig) -> Result<Arc<dyn Camera>, CameraError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let counters = FrameCounters::new();
        counters.record_sent(3);
        counters.record_dropped(1);
        counters.record_sent(2);
        assert_eq!(
            counters.snapshot(),
            FrameStats {
                sent_frames: 5,
                dropped_frames: 1
            }
        );
    }

    #[tokio::test]
    async fn test_announce_only_once() {
        let (tx, rx) = oneshot::channel();
        let (_stop_tx, stop_rx) = watch::channel(false);
        let mut ctx = StreamContext::new(tx, Arc::new(FrameCounters::new()), stop_rx);

        let description = SessionDescription {
            audio: "a".into(),
            video: "v".into(),
        };
        assert!(ctx.announce(description.clone()));
        assert!(!ctx.announce(SessionDescription::default()));
        assert_eq!(rx.await.unwrap(), description);
    }

    #[tokio::test]
    async fn test_stopped_resolves_on_signal_or_drop() {
        let (tx, _rx) = oneshot::channel();
        let (stop_tx, stop_rx) = watch::channel(false);
        let mut ctx = StreamContext::new(tx, Arc::new(FrameCounters::new()), stop_rx);

        assert!(!ctx.is_stopped());
        stop_tx.send_replace(true);
        ctx.stopped().await;
        assert!(ctx.is_stopped());

        let (tx, _rx) = oneshot::channel();
        let (stop_tx, stop_rx) = watch::channel(false);
        let mut ctx = StreamContext::new(tx, Arc::new(FrameCounters::new()), stop_rx);
        drop(stop_tx);
        ctx.stopped().await;
    }

    #[test]
    fn test_stopped_pends_until_signal() {
        let (tx, _rx) = oneshot::channel();
        let (stop_tx, stop_rx) = watch::channel(false);
        let mut ctx = StreamContext::new(tx, Arc::new(FrameCounters::new()), stop_rx);

        let mut stopped = tokio_test::task::spawn(ctx.stopped());
        tokio_test::assert_pending!(stopped.poll());

        stop_tx.send_replace(true);
        assert!(stopped.is_woken());
        tokio_test::assert_ready!(stopped.poll());
    }
}
