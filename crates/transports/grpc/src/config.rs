//! Service configuration
//!
//! Defaults, then an optional TOML file, then `CAMERA_PROVIDER_*`
//! environment variables. The binary applies its command-line flags last.

use camera_provider_core::camera::simulated::SimulatedCameraSettings;
use camera_provider_core::StreamSettings;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Configuration for the camera provider gRPC service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind to
    #[serde(default = "default_port")]
    pub port: u16,

    /// Serve over TLS when set
    #[serde(default)]
    pub tls: Option<TlsConfig>,

    /// Enable JSON structured logging
    #[serde(default)]
    pub json_logging: bool,

    /// Session lifecycle settings
    #[serde(default)]
    pub stream: StreamSettings,

    /// Behaviour of the simulated camera backend
    #[serde(default)]
    pub simulator: SimulatedCameraSettings,
}

/// PEM certificate and private key for TLS
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsConfig {
    pub cert_file: PathBuf,
    pub key_file: PathBuf,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5390
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            tls: None,
            json_logging: false,
            stream: StreamSettings::default(),
            simulator: SimulatedCameraSettings::default(),
        }
    }
}

impl ServiceConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.as_ref().display(), e)))?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load the file if it exists, then apply environment overrides
    pub fn load<P: AsRef<Path>>(path: Option<P>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) if p.as_ref().exists() => Self::from_file(p)?,
            _ => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Override fields from `CAMERA_PROVIDER_*` environment variables
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Override fields from a variable lookup
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("CAMERA_PROVIDER_HOST") {
            self.host = host;
        }
        if let Some(port) = lookup("CAMERA_PROVIDER_PORT").and_then(|v| v.parse().ok()) {
            self.port = port;
        }
        if let (Some(cert_file), Some(key_file)) = (
            lookup("CAMERA_PROVIDER_TLS_CERT"),
            lookup("CAMERA_PROVIDER_TLS_KEY"),
        ) {
            self.tls = Some(TlsConfig {
                cert_file: cert_file.into(),
                key_file: key_file.into(),
            });
        }
        if let Some(json) = lookup("CAMERA_PROVIDER_JSON_LOGS") {
            self.json_logging = matches!(json.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Some(ms) =
            lookup("CAMERA_PROVIDER_STATUS_INTERVAL_MS").and_then(|v| v.parse().ok())
        {
            self.stream.status_interval_ms = ms;
        }
        if let Some(max) = lookup("CAMERA_PROVIDER_MAX_SESSIONS").and_then(|v| v.parse().ok()) {
            self.stream.max_sessions = max;
        }
    }

    pub fn bind_address(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let address = self.bind_address();
        address
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("bind address {}: {}", address, e)))
    }

    /// Check that the configuration can actually be served
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.socket_addr()?;
        if let Some(tls) = &self.tls {
            if tls.cert_file.as_os_str().is_empty() || tls.key_file.as_os_str().is_empty() {
                return Err(ConfigError::Invalid(
                    "TLS requires both a certificate file and a key file".to_string(),
                ));
            }
        }
        self.stream
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.bind_address(), "0.0.0.0:5390");
        assert!(config.tls.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
            host = "127.0.0.1"
            port = 6000

            [tls]
            cert_file = "/etc/provider/cert.pem"
            key_file = "/etc/provider/key.pem"

            [stream]
            status_interval_ms = 500

            [simulator]
            frame_rate = 30
            "#
        )
        .unwrap();

        let config = ServiceConfig::from_file(file.path()).unwrap();
        assert_eq!(config.bind_address(), "127.0.0.1:6000");
        assert_eq!(
            config.tls.as_ref().map(|t| t.key_file.clone()),
            Some(PathBuf::from("/etc/provider/key.pem"))
        );
        assert_eq!(config.stream.status_interval_ms, 500);
        assert_eq!(config.stream.handshake_timeout_ms, 15_000);
        assert_eq!(config.simulator.frame_rate, 30);
    }

    #[test]
    fn test_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "port = \"not a number\"").unwrap();
        assert!(matches!(
            ServiceConfig::from_file(file.path()),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = ServiceConfig::load(Some("/nonexistent/provider.toml")).unwrap();
        assert_eq!(config.port, 5390);
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("CAMERA_PROVIDER_HOST", "::1"),
            ("CAMERA_PROVIDER_PORT", "7000"),
            ("CAMERA_PROVIDER_TLS_CERT", "cert.pem"),
            ("CAMERA_PROVIDER_TLS_KEY", "key.pem"),
            ("CAMERA_PROVIDER_JSON_LOGS", "true"),
            ("CAMERA_PROVIDER_MAX_SESSIONS", "4"),
            ("CAMERA_PROVIDER_STATUS_INTERVAL_MS", "not-a-number"),
        ]);
        let mut config = ServiceConfig::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.bind_address(), "[::1]:7000");
        assert!(config.socket_addr().is_ok());
        assert!(config.tls.is_some());
        assert!(config.json_logging);
        assert_eq!(config.stream.max_sessions, 4);
        assert_eq!(config.stream.status_interval_ms, 1000);
    }

    #[test]
    fn test_tls_needs_both_files() {
        let mut config = ServiceConfig::default();
        config.apply_overrides(|key| {
            (key == "CAMERA_PROVIDER_TLS_CERT").then(|| "cert.pem".to_string())
        });
        assert!(config.tls.is_none());

        config.tls = Some(TlsConfig {
            cert_file: "cert.pem".into(),
            key_file: PathBuf::new(),
        });
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_invalid_host() {
        let config = ServiceConfig {
            host: "not a host".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
