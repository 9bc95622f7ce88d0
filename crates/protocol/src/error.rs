//! Protocol error types
//!
//! Errors that can occur while establishing, using or parsing an inspection
//! connection. The variants fall into three groups:
//!
//! - connection errors: the transport could not be established
//! - transport errors: a read or write failed mid-stream, or the peer left
//! - protocol errors: bytes arrived intact but do not form a known frame

use std::io;

use thiserror::Error;

/// Errors that can occur during protocol operations
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Could not connect to the peer
    #[error("failed to connect to {address}: {source}")]
    Connection {
        /// Address that was dialed
        address: String,
        /// Underlying IO error
        #[source]
        source: io::Error,
    },

    /// Could not bind the listening socket
    #[error("failed to bind {address}: {source}")]
    Bind {
        /// Address that was requested
        address: String,
        /// Underlying IO error
        #[source]
        source: io::Error,
    },

    /// Read or write failed on an established connection
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),

    /// Connection was closed locally or by the peer
    #[error("connection closed")]
    ConnectionClosed,

    /// Frame type code is not part of the protocol
    #[error("unknown frame type {code} ({len} byte payload discarded)")]
    UnknownFrameType { code: u32, len: u64 },

    /// Declared payload length exceeds the receive limit
    #[error("frame too large: {size} bytes exceeds limit of {limit}")]
    FrameTooLarge { size: u64, limit: u64 },

    /// Payload could not be interpreted (e.g. a non UTF-8 node name)
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}

impl ProtocolError {
    /// Create a connection error
    #[inline]
    pub fn connection(address: impl Into<String>, source: io::Error) -> Self {
        Self::Connection {
            address: address.into(),
            source,
        }
    }

    /// Create an invalid payload error
    #[inline]
    pub fn invalid_payload(msg: impl Into<String>) -> Self {
        Self::InvalidPayload(msg.into())
    }

    /// Check if the transport could not be established at all
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }

    /// Check if an established stream broke
    pub fn is_transport_error(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::ConnectionClosed)
    }

    /// Check if the connection is still usable after this error
    ///
    /// An unknown frame type is fully consumed before it is reported, so the
    /// stream stays aligned on the next frame boundary.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::UnknownFrameType { .. } | Self::InvalidPayload(_))
    }
}
