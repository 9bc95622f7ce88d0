//! Spyglass Protocol - wire format and transport for traffic inspection
//!
//! This crate carries frames between pipeline nodes and the inspector:
//! - `codec` - little-endian fixed-width integer helpers
//! - `Frame` / `FrameType` - the five message kinds and their 12-byte header
//! - `Connection` - a framed, ordered stream with a non-blocking readiness check
//! - `Acceptor` - the inspector-side accept loop, one task per connection
//!
//! # Design Principles
//!
//! - **Length-prefixed**: payloads may hold any byte value, no escaping
//! - **Whole frames only**: partial frames are buffered, never exposed
//! - **No retries**: reconnecting is the caller's decision
//!
//! # Trust boundary
//!
//! No authentication or encryption. Meant for same-host debugging.

pub mod acceptor;
pub mod codec;
pub mod connection;
mod error;
pub mod frame;

pub use acceptor::{Acceptor, AcceptorHandle, AcceptorSnapshot};
pub use connection::Connection;
pub use error::ProtocolError;
pub use frame::{Frame, FrameHeader, FrameType, HEADER_LEN, MAX_FRAME_PAYLOAD, try_decode};

// Re-export bytes for convenience
pub use bytes::{Bytes, BytesMut};

/// Result type for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

#[cfg(test)]
mod error_test;
