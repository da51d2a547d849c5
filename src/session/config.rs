//! Session timing and protocol settings

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result, protocol::ProtocolConfig};

/// Configuration for a [`super::Session`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Wait for the upload ACK, on top of the estimated transfer time
    pub upload_timeout_ms: u64,
    /// Wait for a device-originated move
    pub response_timeout_ms: u64,
    pub protocol: ProtocolConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            upload_timeout_ms: 2_000,
            response_timeout_ms: 60_000,
            protocol: ProtocolConfig::default(),
        }
    }
}

impl SessionConfig {
    pub fn with_upload_timeout(mut self, timeout: Duration) -> Self {
        self.upload_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_max_line_len(mut self, max_line_len: usize) -> Self {
        self.protocol.max_line_len = max_line_len;
        self
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_millis(self.upload_timeout_ms)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.upload_timeout_ms == 0 || self.response_timeout_ms == 0 {
            return Err(Error::InvalidConfiguration {
                message: "session timeouts must be positive".to_string(),
            });
        }
        self.protocol.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: SessionConfig =
            serde_json::from_str(r#"{"upload_timeout_ms": 500}"#).unwrap();
        assert_eq!(config.upload_timeout(), Duration::from_millis(500));
        assert_eq!(config.response_timeout(), Duration::from_secs(60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = SessionConfig::default().with_response_timeout(Duration::ZERO);
        assert!(config.validate().is_err());
    }
}
