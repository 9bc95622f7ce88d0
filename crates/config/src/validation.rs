//! Configuration validation
//!
//! Checks values serde cannot reject on its own:
//! - inspector address is non-empty and port is non-zero
//! - inspector channel capacity is non-zero
//! - preselected node names are non-empty

use crate::Config;
use crate::error::{ConfigError, Result};

/// Validate the entire configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_inspector(config)?;
    Ok(())
}

fn validate_inspector(config: &Config) -> Result<()> {
    let inspector = &config.inspector;

    if inspector.address.trim().is_empty() {
        return Err(ConfigError::invalid_value(
            "inspector",
            "address",
            "must not be empty",
        ));
    }

    if inspector.port == 0 {
        return Err(ConfigError::invalid_value(
            "inspector",
            "port",
            "must not be 0",
        ));
    }

    if inspector.channel_capacity == 0 {
        return Err(ConfigError::invalid_value(
            "inspector",
            "channel_capacity",
            "must be at least 1",
        ));
    }

    if inspector.inspect.iter().any(|name| name.trim().is_empty()) {
        return Err(ConfigError::invalid_value(
            "inspector",
            "inspect",
            "node names must not be empty",
        ));
    }

    Ok(())
}
