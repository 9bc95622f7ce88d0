//! Little-endian fixed-width integer codec
//!
//! Frame headers are built from these four functions. They operate on
//! fixed-size windows so callers never deal with short buffers.

/// Encode a `u32` into a 4-byte little-endian window
#[inline]
pub const fn encode_u32_le(value: u32) -> [u8; 4] {
    value.to_le_bytes()
}

/// Encode a `u64` into an 8-byte little-endian window
#[inline]
pub const fn encode_u64_le(value: u64) -> [u8; 8] {
    value.to_le_bytes()
}

/// Decode a `u32` from a 4-byte little-endian window
#[inline]
pub const fn decode_u32_le(window: [u8; 4]) -> u32 {
    u32::from_le_bytes(window)
}

/// Decode a `u64` from an 8-byte little-endian window
#[inline]
pub const fn decode_u64_le(window: [u8; 8]) -> u64 {
    u64::from_le_bytes(window)
}
