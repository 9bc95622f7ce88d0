//! Inspector configuration
//!
//! One section serves both ends of the connection: pipeline nodes read the
//! endpoint, activation flag and tap mode; the inspector binary reads the
//! endpoint and which nodes to inspect on arrival.

use serde::Deserialize;

/// Default inspector address (loopback only, the protocol has no auth)
pub const DEFAULT_ADDRESS: &str = "127.0.0.1";

/// Default inspector port
pub const DEFAULT_PORT: u16 = 8081;

/// Default capacity of the per-node inspector channel
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

/// How intercepted traffic reaches the inspector
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TapMode {
    /// Each node duplicates its own outputs onto a reserved channel
    #[default]
    PerNode,
    /// One observer node receives a copy of every tappable route
    RouteCopy,
}

impl TapMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PerNode => "per_node",
            Self::RouteCopy => "route_copy",
        }
    }
}

/// `[inspector]` section
///
/// ```toml
/// [inspector]
/// enabled = true
/// address = "127.0.0.1"
/// port = 8081
/// mode = "per_node"
/// channel_capacity = 1000
/// inspect_all = false
/// inspect = ["tpc-clusterer"]
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InspectorConfig {
    /// Whether nodes tap their traffic at all (off unless asked for)
    pub enabled: bool,

    /// Inspector address
    pub address: String,

    /// Inspector port
    pub port: u16,

    /// Duplication strategy
    pub mode: TapMode,

    /// Capacity of each inspector-bound channel
    pub channel_capacity: usize,

    /// Inspector side: send INSPECT_ON to every node as it registers
    pub inspect_all: bool,

    /// Inspector side: nodes to inspect as soon as they register
    pub inspect: Vec<String>,
}

impl Default for InspectorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            address: DEFAULT_ADDRESS.to_string(),
            port: DEFAULT_PORT,
            mode: TapMode::default(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            inspect_all: false,
            inspect: Vec::new(),
        }
    }
}

impl InspectorConfig {
    /// `address:port` string
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }

    /// Whether `node` should be inspected as soon as it registers
    pub fn preselects(&self, node: &str) -> bool {
        self.inspect_all || self.inspect.iter().any(|name| name == node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = InspectorConfig::default();
        assert!(!config.enabled);
        assert_eq!(config.endpoint(), "127.0.0.1:8081");
        assert_eq!(config.mode, TapMode::PerNode);
        assert_eq!(config.channel_capacity, 1000);
    }

    #[test]
    fn test_deserialize_route_copy() {
        let config: InspectorConfig = toml::from_str(
            r#"
enabled = true
port = 9000
mode = "route_copy"
"#,
        )
        .unwrap();
        assert!(config.enabled);
        assert_eq!(config.port, 9000);
        assert_eq!(config.address, DEFAULT_ADDRESS);
        assert_eq!(config.mode, TapMode::RouteCopy);
    }

    #[test]
    fn test_unknown_mode_rejected() {
        let result: Result<InspectorConfig, _> = toml::from_str(r#"mode = "broadcast""#);
        assert!(result.is_err());
    }

    #[test]
    fn test_preselects() {
        let mut config = InspectorConfig {
            inspect: vec!["A".into()],
            ..Default::default()
        };
        assert!(config.preselects("A"));
        assert!(!config.preselects("B"));

        config.inspect_all = true;
        assert!(config.preselects("B"));
    }
}
