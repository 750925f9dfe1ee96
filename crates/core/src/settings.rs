//! Stream lifecycle settings

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Error, Result};

/// Timing and capacity settings applied to every streaming session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSettings {
    /// Interval between frame counter updates
    #[serde(default = "default_status_interval_ms")]
    pub status_interval_ms: u64,

    /// How long a camera may take to produce its session description
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,

    /// How long a stopped camera task may take to wind down before it is aborted
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,

    /// Maximum concurrent sessions (0 = unlimited)
    #[serde(default)]
    pub max_sessions: usize,

    /// Maximum session lifetime in seconds (0 = unlimited)
    #[serde(default)]
    pub max_session_duration_secs: u64,
}

fn default_status_interval_ms() -> u64 {
    1000
}

fn default_handshake_timeout_ms() -> u64 {
    15_000
}

fn default_shutdown_grace_ms() -> u64 {
    2000
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            status_interval_ms: default_status_interval_ms(),
            handshake_timeout_ms: default_handshake_timeout_ms(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
            max_sessions: 0,
            max_session_duration_secs: 0,
        }
    }
}

impl StreamSettings {
    pub fn status_interval(&self) -> Duration {
        Duration::from_millis(self.status_interval_ms)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    pub fn max_session_duration(&self) -> Option<Duration> {
        (self.max_session_duration_secs > 0)
            .then(|| Duration::from_secs(self.max_session_duration_secs))
    }

    /// Reject settings that would stall the status feed or the handshake
    pub fn validate(&self) -> Result<()> {
        if self.status_interval_ms == 0 {
            return Err(Error::InvalidConfiguration(
                "status_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.handshake_timeout_ms == 0 {
            return Err(Error::InvalidConfiguration(
                "handshake_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = StreamSettings::default();
        assert_eq!(settings.status_interval(), Duration::from_secs(1));
        assert_eq!(settings.handshake_timeout(), Duration::from_secs(15));
        assert_eq!(settings.max_session_duration(), None);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let settings: StreamSettings = toml::from_str(
            r#"
            status_interval_ms = 250
            max_sessions = 8
            "#,
        )
        .unwrap();
        assert_eq!(settings.status_interval(), Duration::from_millis(250));
        assert_eq!(settings.max_sessions, 8);
        assert_eq!(settings.shutdown_grace_ms, 2000);
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let settings = StreamSettings {
            status_interval_ms: 0,
            ..Default::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(Error::InvalidConfiguration(_))
        ));
    }
}
