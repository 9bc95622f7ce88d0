//! Message parts as the host pipeline hands them to a tap
//!
//! A pipeline message is a `Multipart`: an ordered list of parts, each a
//! binary header chain plus a payload. Taps only ever borrow the original;
//! whatever goes to the inspector is a `duplicate()` with its own buffers.

use bytes::BytesMut;

use crate::headers::{DataHeader, HeaderBlock, encode_chain, find_data_header, parse_header_chain};

/// One header + payload pair
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessagePart {
    /// Encoded header chain
    pub header: BytesMut,
    /// Payload bytes
    pub payload: BytesMut,
}

impl MessagePart {
    pub fn new(header: BytesMut, payload: BytesMut) -> Self {
        Self { header, payload }
    }

    /// Build a part from header blocks and payload bytes
    pub fn from_blocks(blocks: &[HeaderBlock], payload: &[u8]) -> Self {
        Self {
            header: encode_chain(blocks),
            payload: BytesMut::from(payload),
        }
    }

    /// Parse the header chain
    pub fn headers(&self) -> Vec<HeaderBlock> {
        parse_header_chain(&self.header)
    }

    /// The part's `DataHeader`, if its chain carries one
    pub fn data_header(&self) -> Option<DataHeader> {
        find_data_header(&self.headers()).cloned()
    }

    /// Header plus payload size in bytes
    pub fn len(&self) -> usize {
        self.header.len() + self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.header.is_empty() && self.payload.is_empty()
    }

    /// Copy into freshly allocated buffers
    ///
    /// The copy shares nothing with `self`: writing to either never shows in
    /// the other.
    pub fn duplicate(&self) -> Self {
        Self {
            header: BytesMut::from(&self.header[..]),
            payload: BytesMut::from(&self.payload[..]),
        }
    }
}

/// An ordered, multi-part pipeline message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Multipart {
    parts: Vec<MessagePart>,
}

impl Multipart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, part: MessagePart) {
        self.parts.push(part);
    }

    pub fn parts(&self) -> &[MessagePart] {
        &self.parts
    }

    /// Mutable access, for the owning node only
    pub fn parts_mut(&mut self) -> &mut [MessagePart] {
        &mut self.parts
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MessagePart> {
        self.parts.iter()
    }

    /// Total bytes across all parts
    pub fn total_bytes(&self) -> usize {
        self.parts.iter().map(MessagePart::len).sum()
    }

    /// Deep copy of every part, in order
    pub fn duplicate(&self) -> Self {
        Self {
            parts: self.parts.iter().map(MessagePart::duplicate).collect(),
        }
    }
}

impl From<Vec<MessagePart>> for Multipart {
    fn from(parts: Vec<MessagePart>) -> Self {
        Self { parts }
    }
}

impl FromIterator<MessagePart> for Multipart {
    fn from_iter<I: IntoIterator<Item = MessagePart>>(iter: I) -> Self {
        Self {
            parts: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Multipart {
    type Item = MessagePart;
    type IntoIter = std::vec::IntoIter<MessagePart>;

    fn into_iter(self) -> Self::IntoIter {
        self.parts.into_iter()
    }
}

impl<'a> IntoIterator for &'a Multipart {
    type Item = &'a MessagePart;
    type IntoIter = std::slice::Iter<'a, MessagePart>;

    fn into_iter(self) -> Self::IntoIter {
        self.parts.iter()
    }
}

/// A duplicated message on its way to the inspector, tagged with its sender
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TappedMessage {
    /// Name of the node that produced the message
    pub sender: String,
    pub message: Multipart,
}

impl TappedMessage {
    pub fn new(sender: impl Into<String>, message: Multipart) -> Self {
        Self {
            sender: sender.into(),
            message,
        }
    }
}

#[cfg(test)]
#[path = "message_test.rs"]
mod tests;
