//! Display documents
//!
//! A `DisplayDocument` is the inspector-facing view of one message part: an
//! insertion-ordered map of field name to JSON value. Field order is fixed:
//!
//! 1. `sender`
//! 2. header fields, in chain order
//! 3. `payload`, omitted when the payload cannot be rendered
//!
//! Building a document only reads the part.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{RenderError, Result};
use crate::headers::{HeaderBlock, SerializationMethod};
use crate::message::MessagePart;
use crate::render::RendererRegistry;

/// Ordered field map sent to the inspector as a DATA payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DisplayDocument {
    fields: Map<String, Value>,
}

impl DisplayDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field (replacing keeps the original position)
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Field names in document order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Fields in document order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Sending node, if set
    pub fn sender(&self) -> Option<&str> {
        self.get("sender").and_then(Value::as_str)
    }

    /// Rendered payload, if any
    pub fn payload(&self) -> Option<&Value> {
        self.get("payload")
    }

    /// Serialize to compact JSON bytes (the DATA frame payload)
    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Serialize to indented JSON for display
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a DATA frame payload
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Render one message part into a display document
///
/// The payload is rendered with the renderer for the serialization method
/// named by the part's `DataHeader` (opaque bytes when there is none). A
/// render failure drops the `payload` field and nothing else.
pub fn build_display_document(
    sender: &str,
    part: &MessagePart,
    renderers: &RendererRegistry,
) -> DisplayDocument {
    let mut doc = DisplayDocument::new();
    doc.insert("sender", sender);

    let mut serialization = SerializationMethod::None;

    for block in part.headers() {
        match block {
            HeaderBlock::Data(header) => {
                doc.insert("origin", header.origin);
                doc.insert("description", header.description);
                doc.insert("subSpecification", header.sub_specification);
                doc.insert("firstTForbit", header.first_tf_orbit);
                doc.insert("tfCounter", header.tf_counter);
                doc.insert("runNumber", header.run_number);
                doc.insert("payloadSize", header.payload_size);
                doc.insert("splitPayloadParts", header.split_payload_parts);
                doc.insert("payloadSerialization", header.payload_serialization.to_string());
                doc.insert("payloadSplitIndex", header.split_payload_index);
                serialization = header.payload_serialization;
            }
            HeaderBlock::Timing(header) => {
                doc.insert("startTime", header.start_time);
                doc.insert("duration", header.duration);
                doc.insert("creationTimer", header.creation_time);
            }
            HeaderBlock::Task(header) => {
                doc.insert("taskHash", header.task_hash);
            }
            HeaderBlock::Unknown { .. } => {}
        }
    }

    match renderers.render(&serialization, &part.payload) {
        Ok(value) => doc.insert("payload", value),
        Err(e @ RenderError::UnsupportedPayload { .. }) => {
            debug!(sender, error = %e, "payload left out of display document");
        }
        Err(e) => {
            warn!(sender, error = %e, "failed to render payload");
        }
    }

    doc
}

#[cfg(test)]
#[path = "document_test.rs"]
mod tests;
