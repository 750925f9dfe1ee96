//! Explicit session teardown

use tracing::{info, warn};

use crate::config::RtpConfig;
use crate::error::{Error, Result};
use crate::identity::SessionId;
use crate::orchestrator::StreamOrchestrator;
use crate::session::SessionState;

/// Result of a stop request, as reported to the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopOutcome {
    pub successful: bool,
    /// Empty on success, otherwise the failing [`Error::kind`]
    pub error_kind: String,
    pub message: String,
}

impl StopOutcome {
    pub fn stopped() -> Self {
        Self {
            successful: true,
            error_kind: String::new(),
            message: String::new(),
        }
    }

    pub fn failed(err: &Error) -> Self {
        let message = match err {
            Error::StreamNotFound(_) => "Camera stream not found".to_string(),
            Error::CouldNotCloseStream(reason) => reason.clone(),
            other => other.to_string(),
        };
        Self {
            successful: false,
            error_kind: err.kind().to_string(),
            message,
        }
    }
}

impl StreamOrchestrator {
    /// Stop the session `config` refers to, reporting the outcome as data
    pub async fn stop(&self, config: &RtpConfig) -> StopOutcome {
        match self.try_stop(config).await {
            Ok(id) => {
                info!(session_id = %id, "Camera stream stopped");
                StopOutcome::stopped()
            }
            Err(e) => {
                warn!(kind = e.kind(), error = %e, "Stop request failed");
                StopOutcome::failed(&e)
            }
        }
    }

    /// Stop the session `config` refers to.
    ///
    /// A camera that fails to close keeps its registry entry so the stop can
    /// be retried. On success the entry is removed and the status feed is
    /// signalled to end.
    pub async fn try_stop(&self, config: &RtpConfig) -> Result<SessionId> {
        let id = SessionId::derive(config)?;
        let session = self
            .registry()
            .get(&id)
            .await
            .ok_or_else(|| Error::StreamNotFound(id.clone()))?;

        let previous = session.state();
        session.set_state(SessionState::Stopping);

        if let Err(e) = session.close().await {
            session.set_state(previous);
            return Err(Error::CouldNotCloseStream(e.to_string()));
        }

        self.registry().remove_if_same(&session).await;
        session.cancel();
        Ok(id)
    }
}
