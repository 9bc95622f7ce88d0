//! Spyglass Configuration
//!
//! TOML-based configuration loading with sensible defaults.
//! An empty file is a valid config: inspection off, inspector on loopback.
//!
//! # Parsing
//!
//! ```
//! use spyglass_config::Config;
//! use std::str::FromStr;
//!
//! let config = Config::from_str("[inspector]\nenabled = true").unwrap();
//! assert!(config.inspector.enabled);
//! ```
//!
//! # Example Config
//!
//! ```toml
//! [inspector]
//! enabled = true
//! address = "127.0.0.1"
//! port = 8081
//! mode = "per_node"
//! channel_capacity = 1000
//!
//! [log]
//! level = "info"
//! format = "console"
//! output = "stdout"
//! ```

mod error;
mod inspector;
mod logging;
mod validation;

use std::fs;
use std::path::Path;
use std::str::FromStr;

pub use error::{ConfigError, Result};
pub use inspector::{
    DEFAULT_ADDRESS, DEFAULT_CHANNEL_CAPACITY, DEFAULT_PORT, InspectorConfig, TapMode,
};
pub use logging::{LogConfig, LogFormat, LogLevel, LogOutput};

use serde::Deserialize;

/// Main configuration structure
///
/// All sections are optional with sensible defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Inspector endpoint and tap behavior
    pub inspector: InspectorConfig,

    /// Logging configuration
    pub log: LogConfig,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read, contains invalid TOML or fails
    /// validation.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_str(&contents)
    }

    /// Parse and validate
    fn parse(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    ///
    /// Called by `from_file` and `from_str`; call it again after applying
    /// command-line overrides.
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_str("").unwrap();
        assert!(!config.inspector.enabled);
        assert_eq!(config.inspector.port, DEFAULT_PORT);
        assert_eq!(config.log.level, LogLevel::Info);
    }

    #[test]
    fn test_full_config_parse() {
        let toml = r#"
[inspector]
enabled = true
address = "127.0.0.1"
port = 8081
mode = "route_copy"
channel_capacity = 64
inspect = ["A", "B"]

[log]
level = "debug"
format = "json"
output = "stderr"
"#;
        let config = Config::from_str(toml).unwrap();
        assert!(config.inspector.enabled);
        assert_eq!(config.inspector.mode, TapMode::RouteCopy);
        assert_eq!(config.inspector.channel_capacity, 64);
        assert_eq!(config.inspector.inspect, vec!["A", "B"]);
        assert_eq!(config.log.format, LogFormat::Json);
        assert_eq!(config.log.output, LogOutput::Stderr);
    }

    #[test]
    fn test_invalid_toml() {
        let err = Config::from_str("[inspector\nport = 1").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_zero_port_rejected() {
        let err = Config::from_str("[inspector]\nport = 0").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "port", .. }));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let err = Config::from_str("[inspector]\nchannel_capacity = 0").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                field: "channel_capacity",
                ..
            }
        ));
    }

    #[test]
    fn test_empty_address_rejected() {
        let err = Config::from_str("[inspector]\naddress = \" \"").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "address", .. }));
    }

    #[test]
    fn test_empty_preselected_name_rejected() {
        let err = Config::from_str("[inspector]\ninspect = [\"A\", \"\"]").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "inspect", .. }));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[inspector]\nenabled = true\nport = 18081").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert!(config.inspector.enabled);
        assert_eq!(config.inspector.port, 18081);
    }

    #[test]
    fn test_from_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.toml");

        let err = Config::from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::IoError { .. }));
        assert!(err.to_string().contains("missing.toml"));
    }
}
