//! Payload renderers
//!
//! A payload's `DataHeader` names its serialization method; the
//! `RendererRegistry` maps that method to a `PayloadRenderer` producing a
//! JSON value for the display document. Methods without a renderer fail
//! with `UnsupportedPayload`, which the document builder swallows.
//!
//! Built in:
//! - `NONE` → [`HexDumpRenderer`]
//! - `ARROW` → [`ArrowTableRenderer`]
//! - `JSON` → [`JsonRenderer`]

use std::collections::HashMap;
use std::fmt::{self, Write as _};
use std::io::Cursor;
use std::sync::Arc;

use arrow::ipc::reader::StreamReader;
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;
use serde_json::{Value, json};

use crate::error::RenderError;
use crate::headers::SerializationMethod;

/// Added to each byte, read as signed, before hex formatting
const HEX_BIAS: i16 = 128;

/// Turns one payload into a display value
pub trait PayloadRenderer: Send + Sync {
    fn render(&self, payload: &[u8]) -> Result<Value, RenderError>;
}

// =============================================================================
// Hex dump
// =============================================================================

/// Space-separated hex dump of opaque bytes
///
/// Each byte is read as a signed value and shifted by +128, so `0x00`
/// shows as `80` and `0xff` as `7f`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HexDumpRenderer;

impl PayloadRenderer for HexDumpRenderer {
    fn render(&self, payload: &[u8]) -> Result<Value, RenderError> {
        Ok(Value::String(hex_dump(payload)))
    }
}

/// Biased hex dump, see [`HexDumpRenderer`]
pub fn hex_dump(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, &byte) in bytes.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let biased = (byte as i8 as i16 + HEX_BIAS) as u8;
        let _ = write!(out, "{biased:02x}");
    }
    out
}

// =============================================================================
// Arrow
// =============================================================================

/// Summary of an Arrow IPC stream: schema, row count and a table preview
#[derive(Debug, Clone, Copy)]
pub struct ArrowTableRenderer {
    preview_rows: usize,
}

impl ArrowTableRenderer {
    pub const DEFAULT_PREVIEW_ROWS: usize = 10;

    pub fn new(preview_rows: usize) -> Self {
        Self { preview_rows }
    }
}

impl Default for ArrowTableRenderer {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PREVIEW_ROWS)
    }
}

impl PayloadRenderer for ArrowTableRenderer {
    fn render(&self, payload: &[u8]) -> Result<Value, RenderError> {
        let reader = StreamReader::try_new(Cursor::new(payload), None)
            .map_err(|e| RenderError::corrupt(format!("arrow stream: {e}")))?;

        let columns: Vec<Value> = reader
            .schema()
            .fields()
            .iter()
            .map(|field| json!({ "name": field.name(), "type": field.data_type().to_string() }))
            .collect();

        let mut rows = 0usize;
        let mut remaining = self.preview_rows;
        let mut preview: Vec<RecordBatch> = Vec::new();

        for batch in reader {
            let batch = batch.map_err(|e| RenderError::corrupt(format!("arrow batch: {e}")))?;
            rows += batch.num_rows();

            if remaining > 0 && batch.num_rows() > 0 {
                let take = remaining.min(batch.num_rows());
                preview.push(batch.slice(0, take));
                remaining -= take;
            }
        }

        let table = if preview.is_empty() {
            String::new()
        } else {
            pretty_format_batches(&preview)
                .map_err(|e| RenderError::corrupt(format!("arrow preview: {e}")))?
                .to_string()
        };

        Ok(json!({
            "columns": columns,
            "rows": rows,
            "preview": table,
        }))
    }
}

// =============================================================================
// JSON
// =============================================================================

/// Parses the payload as JSON and embeds the value as is
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRenderer;

impl PayloadRenderer for JsonRenderer {
    fn render(&self, payload: &[u8]) -> Result<Value, RenderError> {
        serde_json::from_slice(payload).map_err(|e| RenderError::corrupt(format!("json: {e}")))
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Renderers keyed by serialization method
#[derive(Clone)]
pub struct RendererRegistry {
    renderers: HashMap<SerializationMethod, Arc<dyn PayloadRenderer>>,
}

impl RendererRegistry {
    /// Registry with the built-in renderers
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(SerializationMethod::None, HexDumpRenderer);
        registry.register(SerializationMethod::Arrow, ArrowTableRenderer::default());
        registry.register(SerializationMethod::Json, JsonRenderer);
        registry
    }

    /// Registry with no renderers at all
    pub fn empty() -> Self {
        Self {
            renderers: HashMap::new(),
        }
    }

    /// Add or replace the renderer for `method`
    pub fn register<R>(&mut self, method: SerializationMethod, renderer: R)
    where
        R: PayloadRenderer + 'static,
    {
        self.renderers.insert(method, Arc::new(renderer));
    }

    pub fn supports(&self, method: &SerializationMethod) -> bool {
        self.renderers.contains_key(method)
    }

    /// Render `payload` with the renderer registered for `method`
    pub fn render(
        &self,
        method: &SerializationMethod,
        payload: &[u8],
    ) -> Result<Value, RenderError> {
        match self.renderers.get(method) {
            Some(renderer) => renderer.render(payload),
            None => Err(RenderError::UnsupportedPayload {
                serialization: method.to_string(),
            }),
        }
    }
}

impl Default for RendererRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RendererRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut methods: Vec<&str> = self.renderers.keys().map(SerializationMethod::as_str).collect();
        methods.sort_unstable();
        f.debug_struct("RendererRegistry")
            .field("methods", &methods)
            .finish()
    }
}

#[cfg(test)]
#[path = "render_test.rs"]
mod tests;
