//! Packet handler configuration.
//!
//! Configuration is plain data deserialized from YAML. Every field has a
//! default, so a document only needs to name the values it changes.
//!
//! ```yaml
//! default_timeout_ms: 5000
//! data_send_timeout_ms: 50000
//! prefix_leading_chars: "+"
//! read_buffer_size: 1600
//! ```

use std::path::Path;
use std::time::Duration;

use cellular_at_core::{DEFAULT_PREFIX_LEADING_CHARS, DEFAULT_READ_BUFFER_SIZE};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default AT command timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;

/// Default timeout for the data phase of a data send, in milliseconds.
pub const DEFAULT_DATA_SEND_TIMEOUT_MS: u64 = 50_000;

/// Tunables for one modem context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PktHandlerConfig {
    /// Timeout used by requests that do not pass one.
    pub default_timeout_ms: u64,
    /// Data phase timeout used by data sends that do not pass one.
    pub data_send_timeout_ms: u64,
    /// Characters accepted in front of a `TOKEN:` prefix.
    pub prefix_leading_chars: String,
    /// Receive bytes buffered before the line processor gives up on a line.
    pub read_buffer_size: usize,
}

impl Default for PktHandlerConfig {
    fn default() -> Self {
        PktHandlerConfig {
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
            data_send_timeout_ms: DEFAULT_DATA_SEND_TIMEOUT_MS,
            prefix_leading_chars: DEFAULT_PREFIX_LEADING_CHARS.to_string(),
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
        }
    }
}

impl PktHandlerConfig {
    /// Parse a configuration from YAML text.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load a configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Timeout used by requests that do not pass one.
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    /// Data phase timeout used by data sends that do not pass one.
    pub fn data_send_timeout(&self) -> Duration {
        Duration::from_millis(self.data_send_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PktHandlerConfig::default();
        assert_eq!(config.default_timeout(), Duration::from_secs(5));
        assert_eq!(config.data_send_timeout(), Duration::from_secs(50));
        assert_eq!(config.prefix_leading_chars, "+");
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = PktHandlerConfig::from_yaml_str("default_timeout_ms: 1200\nprefix_leading_chars: \"+^\"\n")
            .expect("valid yaml");
        assert_eq!(config.default_timeout_ms, 1200);
        assert_eq!(config.prefix_leading_chars, "+^");
        assert_eq!(config.read_buffer_size, DEFAULT_READ_BUFFER_SIZE);
    }

    #[test]
    fn test_invalid_yaml() {
        let err = PktHandlerConfig::from_yaml_str("default_timeout_ms: [1, 2]").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = PktHandlerConfig::load("/nonexistent/pkthandler.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
