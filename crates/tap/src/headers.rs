//! Binary header chain carried in front of every message part
//!
//! A part's header buffer is a sequence of blocks. Each block opens with a
//! 32-byte base header (all integers little-endian):
//!
//! ```text
//! magic:u32 | header_size:u32 | flags:u32 | version:u32 | kind:[u8;8] | serialization:[u8;8]
//! ```
//!
//! followed by `header_size - 32` bytes of kind-specific body. Bit 0 of
//! `flags` says another block follows. Kinds we do not know are kept as
//! `HeaderBlock::Unknown` so newer senders never break the walk.

use std::fmt;

use bytes::{BufMut, BytesMut};
use spyglass_protocol::codec::{decode_u32_le, decode_u64_le, encode_u32_le, encode_u64_le};
use tracing::warn;

/// Magic number opening every block ("2O2O")
pub const HEADER_MAGIC: u32 = 0x4f32_4f32;

/// Size of the base header shared by all kinds
pub const BASE_HEADER_LEN: usize = 32;

/// Flag bit: another block follows this one
const FLAG_NEXT_HEADER: u32 = 0x1;

/// Version written into encoded blocks
const HEADER_VERSION: u32 = 1;

pub const DATA_HEADER_KIND: [u8; 8] = *b"DataHead";
pub const TIMING_HEADER_KIND: [u8; 8] = *b"DataFlow";
pub const TASK_HEADER_KIND: [u8; 8] = *b"OutObjMD";

const DATA_HEADER_BODY: usize = 60;
const TIMING_HEADER_BODY: usize = 24;
const TASK_HEADER_BODY: usize = 4;

// =============================================================================
// Serialization method
// =============================================================================

/// How a payload (or a header block) is serialized
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum SerializationMethod {
    /// Opaque bytes
    #[default]
    None,
    Root,
    Arrow,
    FlatBuf,
    Json,
    /// Anything else, kept verbatim
    Other(String),
}

impl SerializationMethod {
    /// Parse the 8-byte, NUL-padded wire field
    pub fn from_field(field: &[u8; 8]) -> Self {
        match fixed_str(field).as_str() {
            "" | "NONE" => Self::None,
            "ROOT" => Self::Root,
            "ARROW" => Self::Arrow,
            "FLATBUF" => Self::FlatBuf,
            "JSON" => Self::Json,
            other => Self::Other(other.to_string()),
        }
    }

    /// Encode as the 8-byte wire field
    pub fn to_field(&self) -> [u8; 8] {
        fixed_field(self.as_str())
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::None => "NONE",
            Self::Root => "ROOT",
            Self::Arrow => "ARROW",
            Self::FlatBuf => "FLATBUF",
            Self::Json => "JSON",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for SerializationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Header kinds
// =============================================================================

/// Describes the payload: what it is, where it came from, how it is split
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataHeader {
    /// Data origin, up to 4 bytes (e.g. "TPC")
    pub origin: String,
    /// Data description, up to 16 bytes (e.g. "CLUSTERS")
    pub description: String,
    pub sub_specification: u32,
    pub split_payload_index: u32,
    pub split_payload_parts: u32,
    pub payload_serialization: SerializationMethod,
    pub payload_size: u64,
    pub first_tf_orbit: u32,
    pub tf_counter: u32,
    pub run_number: u32,
}

impl DataHeader {
    /// Header for a single-part payload
    pub fn new(origin: &str, description: &str, sub_specification: u32) -> Self {
        Self {
            origin: origin.to_string(),
            description: description.to_string(),
            sub_specification,
            split_payload_parts: 1,
            ..Default::default()
        }
    }

    fn decode(body: &[u8]) -> Option<Self> {
        if body.len() < DATA_HEADER_BODY {
            return None;
        }
        let mut serialization = [0u8; 8];
        serialization.copy_from_slice(&body[24..32]);

        Some(Self {
            description: fixed_str(&body[0..16]),
            origin: fixed_str(&body[16..20]),
            split_payload_parts: u32_at(body, 20),
            payload_serialization: SerializationMethod::from_field(&serialization),
            sub_specification: u32_at(body, 32),
            split_payload_index: u32_at(body, 36),
            payload_size: u64_at(body, 40),
            first_tf_orbit: u32_at(body, 48),
            tf_counter: u32_at(body, 52),
            run_number: u32_at(body, 56),
        })
    }

    fn encode_body(&self, out: &mut BytesMut) {
        out.put_slice(&fixed_field::<16>(&self.description));
        out.put_slice(&fixed_field::<4>(&self.origin));
        out.put_slice(&encode_u32_le(self.split_payload_parts));
        out.put_slice(&self.payload_serialization.to_field());
        out.put_slice(&encode_u32_le(self.sub_specification));
        out.put_slice(&encode_u32_le(self.split_payload_index));
        out.put_slice(&encode_u64_le(self.payload_size));
        out.put_slice(&encode_u32_le(self.first_tf_orbit));
        out.put_slice(&encode_u32_le(self.tf_counter));
        out.put_slice(&encode_u32_le(self.run_number));
    }
}

/// Timing of the processing step that produced the message
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimingHeader {
    pub start_time: u64,
    pub duration: u64,
    pub creation_time: u64,
}

impl TimingHeader {
    fn decode(body: &[u8]) -> Option<Self> {
        if body.len() < TIMING_HEADER_BODY {
            return None;
        }
        Some(Self {
            start_time: u64_at(body, 0),
            duration: u64_at(body, 8),
            creation_time: u64_at(body, 16),
        })
    }

    fn encode_body(&self, out: &mut BytesMut) {
        out.put_slice(&encode_u64_le(self.start_time));
        out.put_slice(&encode_u64_le(self.duration));
        out.put_slice(&encode_u64_le(self.creation_time));
    }
}

/// Identifies the task that produced an output object
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskHeader {
    pub task_hash: u32,
}

/// One block of a header chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderBlock {
    Data(DataHeader),
    Timing(TimingHeader),
    Task(TaskHeader),
    /// A kind we do not interpret; `size` includes the base header
    Unknown { kind: String, size: u32 },
}

impl HeaderBlock {
    /// 8-byte kind tag
    pub fn kind(&self) -> [u8; 8] {
        match self {
            Self::Data(_) => DATA_HEADER_KIND,
            Self::Timing(_) => TIMING_HEADER_KIND,
            Self::Task(_) => TASK_HEADER_KIND,
            Self::Unknown { kind, .. } => fixed_field(kind),
        }
    }

    /// Total encoded size, base header included
    pub fn encoded_len(&self) -> usize {
        BASE_HEADER_LEN
            + match self {
                Self::Data(_) => DATA_HEADER_BODY,
                Self::Timing(_) => TIMING_HEADER_BODY,
                Self::Task(_) => TASK_HEADER_BODY,
                Self::Unknown { size, .. } => (*size as usize).saturating_sub(BASE_HEADER_LEN),
            }
    }

    /// Append this block to `out`; `has_next` sets the chain flag
    pub fn encode(&self, has_next: bool, out: &mut BytesMut) {
        let size = self.encoded_len();
        out.reserve(size);

        out.put_slice(&encode_u32_le(HEADER_MAGIC));
        out.put_slice(&encode_u32_le(size as u32));
        out.put_slice(&encode_u32_le(if has_next { FLAG_NEXT_HEADER } else { 0 }));
        out.put_slice(&encode_u32_le(HEADER_VERSION));
        out.put_slice(&self.kind());
        out.put_slice(&SerializationMethod::None.to_field());

        match self {
            Self::Data(header) => header.encode_body(out),
            Self::Timing(header) => header.encode_body(out),
            Self::Task(header) => out.put_slice(&encode_u32_le(header.task_hash)),
            Self::Unknown { .. } => out.put_bytes(0, size - BASE_HEADER_LEN),
        }
    }

    fn decode(kind: &[u8; 8], body: &[u8], size: usize) -> Option<Self> {
        match *kind {
            DATA_HEADER_KIND => DataHeader::decode(body).map(Self::Data),
            TIMING_HEADER_KIND => TimingHeader::decode(body).map(Self::Timing),
            TASK_HEADER_KIND => (body.len() >= TASK_HEADER_BODY).then(|| {
                Self::Task(TaskHeader {
                    task_hash: u32_at(body, 0),
                })
            }),
            _ => Some(Self::Unknown {
                kind: fixed_str(kind),
                size: size as u32,
            }),
        }
    }
}

// =============================================================================
// Chain walking
// =============================================================================

/// Encode blocks into one header buffer, chaining them in order
pub fn encode_chain(blocks: &[HeaderBlock]) -> BytesMut {
    let total = blocks.iter().map(HeaderBlock::encoded_len).sum();
    let mut out = BytesMut::with_capacity(total);
    for (i, block) in blocks.iter().enumerate() {
        block.encode(i + 1 < blocks.len(), &mut out);
    }
    out
}

/// Walk a header buffer and return every block that parses
///
/// A bad magic, an impossible size or a truncated block ends the walk; the
/// blocks read up to that point are returned.
pub fn parse_header_chain(buf: &[u8]) -> Vec<HeaderBlock> {
    let mut blocks = Vec::new();
    let mut offset = 0;

    while offset < buf.len() {
        let rest = &buf[offset..];

        if rest.len() < BASE_HEADER_LEN {
            warn!(offset, remaining = rest.len(), "truncated header block");
            break;
        }

        let magic = u32_at(rest, 0);
        if magic != HEADER_MAGIC {
            warn!(offset, magic = format_args!("{magic:#010x}"), "bad header magic, stopping walk");
            break;
        }

        let size = u32_at(rest, 4) as usize;
        if size < BASE_HEADER_LEN || size > rest.len() {
            warn!(offset, size, remaining = rest.len(), "header block size out of range");
            break;
        }

        let flags = u32_at(rest, 8);
        let mut kind = [0u8; 8];
        kind.copy_from_slice(&rest[16..24]);

        match HeaderBlock::decode(&kind, &rest[BASE_HEADER_LEN..size], size) {
            Some(block) => blocks.push(block),
            None => {
                warn!(offset, kind = %fixed_str(&kind), size, "header block body too short");
                break;
            }
        }

        if flags & FLAG_NEXT_HEADER == 0 {
            break;
        }
        offset += size;
    }

    blocks
}

/// First `DataHeader` in a parsed chain
pub fn find_data_header(blocks: &[HeaderBlock]) -> Option<&DataHeader> {
    blocks.iter().find_map(|block| match block {
        HeaderBlock::Data(header) => Some(header),
        _ => None,
    })
}

// =============================================================================
// Field helpers
// =============================================================================

/// NUL-terminated fixed-width text field
fn fixed_str(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

/// Text into a NUL-padded field, truncated to `N` bytes
fn fixed_field<const N: usize>(text: &str) -> [u8; N] {
    let mut field = [0u8; N];
    let len = text.len().min(N);
    field[..len].copy_from_slice(&text.as_bytes()[..len]);
    field
}

#[inline]
fn u32_at(buf: &[u8], at: usize) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&buf[at..at + 4]);
    decode_u32_le(word)
}

#[inline]
fn u64_at(buf: &[u8], at: usize) -> u64 {
    let mut word = [0u8; 8];
    word.copy_from_slice(&buf[at..at + 8]);
    decode_u64_le(word)
}

#[cfg(test)]
#[path = "headers_test.rs"]
mod tests;
