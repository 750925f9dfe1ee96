//! Session identity
//!
//! A session is identified by a SHA-256 digest of the camera fields that
//! name a media source: `id`, `host`, `port` and `profile_token`.
//! Credentials and the RTP destination only describe how a stream is
//! delivered, so they do not take part. Each field is trimmed and the host
//! is lowercased before hashing, then written with a length prefix so that
//! no two distinct field tuples share an encoding.

use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::config::{CameraConfig, RtpConfig};
use crate::error::{Error, Result};

const DIGEST_DOMAIN: &[u8] = b"camera-provider/session/v1";
const DIGEST_HEX_LEN: usize = 64;

/// Stable identity of a camera streaming session
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(String);

impl SessionId {
    /// Derive the identity of the session a stream request refers to
    pub fn derive(config: &RtpConfig) -> Result<Self> {
        let camera = config.camera.as_ref().ok_or_else(|| {
            Error::InvalidConfiguration("camera configuration is missing".to_string())
        })?;
        Self::for_camera(camera)
    }

    /// Derive the identity of a camera endpoint
    pub fn for_camera(camera: &CameraConfig) -> Result<Self> {
        let id = camera.id.trim();
        let host = camera.host.trim().to_ascii_lowercase();
        let profile = camera.profile_token.trim();

        if id.is_empty() && host.is_empty() {
            return Err(Error::InvalidConfiguration(
                "camera needs an id or a host".to_string(),
            ));
        }
        if camera.port > u32::from(u16::MAX) {
            return Err(Error::InvalidConfiguration(format!(
                "camera port {} is out of range",
                camera.port
            )));
        }
        if host.chars().any(|c| c.is_whitespace() || c == '/') {
            return Err(Error::InvalidConfiguration(format!(
                "camera host {:?} is not a hostname",
                camera.host.trim()
            )));
        }

        let mut hasher = Sha256::new();
        hasher.update(DIGEST_DOMAIN);
        write_field(&mut hasher, id.as_bytes());
        write_field(&mut hasher, host.as_bytes());
        write_field(&mut hasher, &camera.port.to_be_bytes());
        write_field(&mut hasher, profile.as_bytes());

        Ok(Self(hex::encode(hasher.finalize())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Leading characters of the digest, for log lines
    pub fn short(&self) -> &str {
        &self.0[..12]
    }
}

fn write_field(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_be_bytes());
    hasher.update(bytes);
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SessionId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let valid = s.len() == DIGEST_HEX_LEN
            && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
        if !valid {
            return Err(Error::InvalidConfiguration(format!(
                "{:?} is not a session id",
                s
            )));
        }
        Ok(Self(s.to_string()))
    }
}
