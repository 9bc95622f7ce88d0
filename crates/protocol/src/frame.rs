//! Frame model for the inspection wire protocol
//!
//! # Wire Format
//!
//! All integers are little-endian. The header is a fixed 12 bytes:
//! ```text
//! ┌──────────────┬──────────────────┬──────────────────────────┐
//! │ 4 bytes      │ 8 bytes          │ N bytes                  │
//! │ type (LE)    │ payload len (LE) │ payload                  │
//! └──────────────┴──────────────────┴──────────────────────────┘
//! ```
//!
//! Framing is length-prefixed: payloads are arbitrary binary (rendered
//! documents, hex dumps) and may contain any byte value.
//!
//! # Frame Types
//!
//! - `Data` (1): node → inspector, a serialized display document
//! - `DeviceOn` (2): node → inspector, announces the node name
//! - `InspectOn` (3): inspector → node, start duplicating traffic
//! - `InspectOff` (4): inspector → node, stop duplicating traffic
//! - `DeviceOff` (5): node → inspector, node is going away

use bytes::{Buf, Bytes, BytesMut};

use crate::codec::{decode_u32_le, decode_u64_le, encode_u32_le, encode_u64_le};
use crate::error::ProtocolError;

/// Size of the fixed frame header
pub const HEADER_LEN: usize = 12;

/// Largest payload accepted on receive (256MB)
pub const MAX_FRAME_PAYLOAD: u64 = 256 * 1024 * 1024;

/// Frame type discriminants
///
/// NOTE: These values are used on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum FrameType {
    /// Rendered message data
    Data = 1,
    /// Node announcement, payload is the node name
    DeviceOn = 2,
    /// Enable inspection on the receiving node
    InspectOn = 3,
    /// Disable inspection on the receiving node
    InspectOff = 4,
    /// Node deregistration, payload is the node name
    DeviceOff = 5,
}

impl FrameType {
    /// Older name for the node announcement frame
    pub const REGISTER_DEVICE: FrameType = FrameType::DeviceOn;

    /// Parse frame type from its wire code
    #[inline]
    pub const fn from_u32(code: u32) -> Option<Self> {
        match code {
            1 => Some(Self::Data),
            2 => Some(Self::DeviceOn),
            3 => Some(Self::InspectOn),
            4 => Some(Self::InspectOff),
            5 => Some(Self::DeviceOff),
            _ => None,
        }
    }

    /// Convert to wire code
    #[inline]
    pub const fn as_u32(self) -> u32 {
        self as u32
    }

    /// Check if this frame type travels from the inspector to a node
    #[inline]
    pub const fn is_control(self) -> bool {
        matches!(self, Self::InspectOn | Self::InspectOff)
    }

    /// Get the string name of this frame type
    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Data => "data",
            Self::DeviceOn => "device_on",
            Self::InspectOn => "inspect_on",
            Self::InspectOff => "inspect_off",
            Self::DeviceOff => "device_off",
        }
    }
}

impl std::fmt::Display for FrameType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<u32> for FrameType {
    type Error = u32;

    /// Returns the unrecognized code on failure
    fn try_from(code: u32) -> Result<Self, Self::Error> {
        Self::from_u32(code).ok_or(code)
    }
}

/// Decoded frame header
///
/// Keeps the raw type code so unknown frames can still be skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Raw frame type code
    pub code: u32,
    /// Number of payload bytes following the header
    pub payload_len: u64,
}

impl FrameHeader {
    /// Encode into the fixed 12-byte window
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[..4].copy_from_slice(&encode_u32_le(self.code));
        out[4..].copy_from_slice(&encode_u64_le(self.payload_len));
        out
    }

    /// Decode from the fixed 12-byte window
    pub fn decode(window: &[u8; HEADER_LEN]) -> Self {
        let mut code = [0u8; 4];
        let mut len = [0u8; 8];
        code.copy_from_slice(&window[..4]);
        len.copy_from_slice(&window[4..]);
        Self {
            code: decode_u32_le(code),
            payload_len: decode_u64_le(len),
        }
    }

    /// Decode from the front of a buffer without consuming it
    pub fn peek(buf: &[u8]) -> Option<Self> {
        let window: &[u8; HEADER_LEN] = buf.get(..HEADER_LEN)?.try_into().ok()?;
        Some(Self::decode(window))
    }

    /// The frame type, if the code is known
    #[inline]
    pub fn frame_type(&self) -> Option<FrameType> {
        FrameType::from_u32(self.code)
    }
}

/// A single length-prefixed protocol message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame type
    pub frame_type: FrameType,
    /// Opaque payload
    pub payload: Bytes,
}

impl Frame {
    /// Create a frame with the given type and payload
    pub fn new(frame_type: FrameType, payload: impl Into<Bytes>) -> Self {
        Self {
            frame_type,
            payload: payload.into(),
        }
    }

    /// Data frame carrying a rendered document
    pub fn data(payload: impl Into<Bytes>) -> Self {
        Self::new(FrameType::Data, payload)
    }

    /// Node announcement
    pub fn device_on(node_name: &str) -> Self {
        Self::new(FrameType::DeviceOn, Bytes::copy_from_slice(node_name.as_bytes()))
    }

    /// Node deregistration
    pub fn device_off(node_name: &str) -> Self {
        Self::new(FrameType::DeviceOff, Bytes::copy_from_slice(node_name.as_bytes()))
    }

    /// Inspection on, with an empty payload
    pub fn inspect_on() -> Self {
        Self::new(FrameType::InspectOn, Bytes::new())
    }

    /// Inspection off, with an empty payload
    pub fn inspect_off() -> Self {
        Self::new(FrameType::InspectOff, Bytes::new())
    }

    /// Payload length as carried in the header
    #[inline]
    pub fn payload_len(&self) -> u64 {
        self.payload.len() as u64
    }

    /// Header for this frame
    #[inline]
    pub fn header(&self) -> FrameHeader {
        FrameHeader {
            code: self.frame_type.as_u32(),
            payload_len: self.payload_len(),
        }
    }

    /// Encode header and payload into one contiguous buffer
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HEADER_LEN + self.payload.len());
        buf.extend_from_slice(&self.header().encode());
        buf.extend_from_slice(&self.payload);
        buf.freeze()
    }

    /// Interpret the payload as UTF-8 text (node names)
    pub fn payload_str(&self) -> Result<&str, ProtocolError> {
        std::str::from_utf8(&self.payload)
            .map_err(|e| ProtocolError::invalid_payload(format!("invalid UTF-8: {e}")))
    }
}

/// Try to take one complete frame off the front of `buf`
///
/// Returns `Ok(None)` until the header and all `payload_len` bytes are
/// buffered; a partial frame is never exposed. Frames with an unknown type
/// code are consumed whole and reported as `UnknownFrameType`, leaving the
/// buffer aligned on the next frame.
pub fn try_decode(buf: &mut BytesMut) -> Result<Option<Frame>, ProtocolError> {
    let Some(header) = FrameHeader::peek(&buf[..]) else {
        return Ok(None);
    };

    if header.payload_len > MAX_FRAME_PAYLOAD {
        return Err(ProtocolError::FrameTooLarge {
            size: header.payload_len,
            limit: MAX_FRAME_PAYLOAD,
        });
    }

    let total_len = HEADER_LEN + header.payload_len as usize;
    if buf.len() < total_len {
        buf.reserve(total_len - buf.len());
        return Ok(None);
    }

    buf.advance(HEADER_LEN);
    let payload = buf.split_to(header.payload_len as usize).freeze();

    match header.frame_type() {
        Some(frame_type) => Ok(Some(Frame { frame_type, payload })),
        None => Err(ProtocolError::UnknownFrameType {
            code: header.code,
            len: header.payload_len,
        }),
    }
}
