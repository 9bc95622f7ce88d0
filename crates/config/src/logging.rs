//! Logging configuration
//!
//! Controls the internal logging of the inspector and node taps.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Crates whose log level follows `[log] level`
const LOG_TARGETS: &[&str] = &["spyglass", "spyglass_tap", "spyglass_protocol"];

/// Log level
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Level name as understood by `EnvFilter`
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(format!("unknown log level '{other}'")),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable console output (default)
    #[default]
    Console,
    /// JSON structured logging
    Json,
}

/// Log output destination
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    /// Append to a file
    #[serde(untagged)]
    File(String),
}

/// Logging configuration
///
/// ```toml
/// [log]
/// level = "info"
/// format = "console"
/// output = "stderr"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level, default info
    pub level: LogLevel,
    /// Output format, default console
    pub format: LogFormat,
    /// Output destination, default stdout
    pub output: LogOutput,
}

impl LogConfig {
    /// Filter directive for our own crates at the configured level
    ///
    /// Everything else stays at `warn` so dependency chatter does not drown
    /// the inspector output.
    pub fn filter_directive(&self) -> String {
        let mut directive = String::from("warn");
        for target in LOG_TARGETS {
            directive.push(',');
            directive.push_str(target);
            directive.push('=');
            directive.push_str(self.level.as_str());
        }
        directive
    }
}
