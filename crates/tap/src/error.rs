//! Error types for the tap crate

use spyglass_protocol::ProtocolError;
use thiserror::Error;

/// Errors that can occur in the tap system
#[derive(Error, Debug)]
pub enum TapError {
    /// Connection or framing failure talking to the inspector
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Payload could not be rendered
    #[error("render error: {0}")]
    Render(#[from] RenderError),

    /// A node's inspector channel can only be reserved once
    #[error("target channel already set to '{current}'")]
    TargetChannelAlreadySet { current: String },

    /// Channel is at capacity
    #[error("channel '{channel}' is full")]
    ChannelFull { channel: String },

    /// Receiving end of the channel is gone
    #[error("channel '{channel}' closed")]
    ChannelClosed { channel: String },

    /// No channel registered under this name
    #[error("unknown channel '{channel}'")]
    UnknownChannel { channel: String },

    /// Node is not known to the inspector
    #[error("node not registered: {node}")]
    NodeNotFound { node: String },

    /// Display document could not be serialized
    #[error("failed to serialize display document: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl TapError {
    /// Check if the inspector connection is unusable
    pub fn is_transport_error(&self) -> bool {
        matches!(self, Self::Protocol(e) if e.is_transport_error() || e.is_connection_error())
    }
}

/// Errors from rendering a single payload
///
/// Never fatal to a display document: the payload field is left out.
#[derive(Error, Debug)]
pub enum RenderError {
    /// No renderer for this serialization method
    #[error("unsupported payload serialization '{serialization}'")]
    UnsupportedPayload { serialization: String },

    /// Renderer recognized the kind but the bytes are malformed
    #[error("corrupt payload: {0}")]
    Corrupt(String),
}

impl RenderError {
    #[inline]
    pub fn corrupt(msg: impl Into<String>) -> Self {
        Self::Corrupt(msg.into())
    }
}

/// Result type for tap operations
pub type Result<T> = std::result::Result<T, TapError>;
