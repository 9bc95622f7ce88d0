//! Interactive control commands read from stdin

use thiserror::Error;

/// Shown when a line does not parse
pub const USAGE: &str = "commands: on <node>, off <node>, on all, off all, list";

/// A parsed stdin command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Switch one node
    Inspect { node: String, on: bool },
    /// Switch every registered node
    InspectAll { on: bool },
    /// Print registered nodes
    List,
}

/// Why a line was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ParseError(String);

impl Command {
    /// Parse one line; blank lines yield `None`
    pub fn parse(line: &str) -> Result<Option<Self>, ParseError> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(None);
        };
        let target = words.next();

        if let Some(extra) = words.next() {
            return Err(ParseError(format!("unexpected argument '{extra}'")));
        }

        let command = match (verb.to_ascii_lowercase().as_str(), target) {
            ("list" | "ls", None) => Self::List,
            ("on" | "off", None) => return Err(ParseError(format!("'{verb}' needs a node name"))),
            ("on", Some("all")) => Self::InspectAll { on: true },
            ("off", Some("all")) => Self::InspectAll { on: false },
            ("on", Some(node)) => Self::Inspect {
                node: node.to_string(),
                on: true,
            },
            ("off", Some(node)) => Self::Inspect {
                node: node.to_string(),
                on: false,
            },
            _ => return Err(ParseError(format!("unknown command '{}'", line.trim()))),
        };

        Ok(Some(command))
    }
}

#[cfg(test)]
#[path = "commands_test.rs"]
mod tests;
