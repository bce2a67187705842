//! Node configuration.
//!
//! Every field has a default, so an empty TOML document is a valid configuration:
//!
//! ```toml
//! cse_id = "id-in"
//! cse_rn = "cse-in"
//! sort_discovered_resources = true
//! max_discovery_level = 8
//! polling_channel_timeout_ms = 5000
//! ```

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DispatcherConfig {
    /// Own CSE-ID. SP-relative identifiers starting with `/<cse_id>/` are local.
    pub cse_id: String,
    /// Resource name of the `<CSEBase>`; the first segment of structured identifiers.
    pub cse_rn: String,
    /// Order discovered resources by type and name (or creation time for instances).
    pub sort_discovered_resources: bool,
    /// Upper bound for the discovery depth. A request's `lvl` is clamped to it.
    pub max_discovery_level: Option<usize>,
    /// How long a polling-channel RETRIEVE waits for a notification.
    pub polling_channel_timeout_ms: u64,
    /// Storage actor channel capacity.
    pub storage_buffer: usize,
    /// Event bus capacity.
    pub event_capacity: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            cse_id: "id-in".to_string(),
            cse_rn: "cse-in".to_string(),
            sort_discovered_resources: true,
            max_discovery_level: None,
            polling_channel_timeout_ms: 5000,
            storage_buffer: 64,
            event_capacity: 1024,
        }
    }
}

impl DispatcherConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    pub fn polling_channel_timeout(&self) -> Duration {
        Duration::from_millis(self.polling_channel_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        assert_eq!(DispatcherConfig::from_toml_str("").unwrap(), DispatcherConfig::default());
    }

    #[test]
    fn overrides_and_unknown_keys() {
        let config = DispatcherConfig::from_toml_str("cse_id = \"mn-cse\"\nmax_discovery_level = 3\n").unwrap();
        assert_eq!(config.cse_id, "mn-cse");
        assert_eq!(config.max_discovery_level, Some(3));
        assert!(matches!(
            DispatcherConfig::from_toml_str("colour = \"blue\""),
            Err(ConfigError::Parse(_))
        ));
    }
}
