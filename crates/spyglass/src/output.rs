//! Output formatting for inspector events
//!
//! DATA payloads are parsed back into Display Documents and printed either
//! as human-readable text or as JSON.

use std::io::IsTerminal;

use owo_colors::{OwoColorize, Style};
use serde_json::{Value, json};
use spyglass_tap::{DeviceInfo, DisplayDocument, InspectorEvent};

/// Document fields shown in the text header line rather than the field list
const HEADLINE_FIELDS: &[&str] = &["sender", "origin", "description", "subSpecification", "payload"];

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Human-readable text (default)
    Text,
    /// Pretty JSON, one object per event
    Json,
    /// Single-line JSON, one object per line
    Compact,
}

impl Format {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" | "j" => Format::Json,
            "compact" | "c" => Format::Compact,
            _ => Format::Text,
        }
    }
}

/// Whether colored output makes sense
pub fn stdout_is_terminal() -> bool {
    std::io::stdout().is_terminal()
}

/// Color styles for terminal output
struct ColorStyles {
    label: Style,
    node: Style,
    field: Style,
    payload: Style,
    error: Style,
    ok: Style,
}

impl ColorStyles {
    fn new(enabled: bool) -> Self {
        if enabled {
            Self {
                label: Style::new().dimmed(),
                node: Style::new().bold(),
                field: Style::new().dimmed(),
                payload: Style::new(),
                error: Style::new().red(),
                ok: Style::new().green(),
            }
        } else {
            Self {
                label: Style::new(),
                node: Style::new(),
                field: Style::new(),
                payload: Style::new(),
                error: Style::new(),
                ok: Style::new(),
            }
        }
    }
}

/// Output formatter
pub struct Formatter {
    format: Format,
    use_color: bool,
}

impl Formatter {
    pub fn new(format: &str) -> Self {
        Self {
            format: Format::parse(format),
            use_color: true,
        }
    }

    /// Enable or disable color output
    pub fn with_color(mut self, use_color: bool) -> Self {
        self.use_color = use_color;
        self
    }

    /// Print an event to stdout
    pub fn print(&self, event: &InspectorEvent) {
        println!("{}", self.render(event));
    }

    /// Print the registered nodes to stdout
    pub fn print_devices(&self, devices: &[DeviceInfo]) {
        println!("{}", self.render_devices(devices));
    }

    pub fn render(&self, event: &InspectorEvent) -> String {
        match self.format {
            Format::Text => self.render_text(event),
            Format::Json => to_json(&event_json(event), true),
            Format::Compact => to_json(&event_json(event), false),
        }
    }

    pub fn render_devices(&self, devices: &[DeviceInfo]) -> String {
        match self.format {
            Format::Text => self.render_devices_text(devices),
            Format::Json => to_json(&devices_json(devices), true),
            Format::Compact => to_json(&devices_json(devices), false),
        }
    }

    fn render_text(&self, event: &InspectorEvent) -> String {
        let styles = ColorStyles::new(self.use_color);

        match event {
            InspectorEvent::Registered { node, peer } => format!(
                "{} {} {}",
                "+".style(styles.ok),
                node.style(styles.node),
                format!("registered from {peer}").style(styles.label)
            ),
            InspectorEvent::Deregistered { node, clean: true } => format!(
                "{} {} {}",
                "-".style(styles.ok),
                node.style(styles.node),
                "deregistered".style(styles.label)
            ),
            InspectorEvent::Deregistered { node, clean: false } => format!(
                "{} {} {}",
                "-".style(styles.error),
                node.style(styles.node),
                "connection lost".style(styles.error)
            ),
            InspectorEvent::Data { node, payload } => match DisplayDocument::from_json(payload) {
                Ok(doc) => self.render_document_text(&doc, &styles),
                Err(e) => format!(
                    "{} {}",
                    node.style(styles.node),
                    format!("unreadable document ({} bytes): {e}", payload.len()).style(styles.error)
                ),
            },
        }
    }

    fn render_document_text(&self, doc: &DisplayDocument, styles: &ColorStyles) -> String {
        let sender = doc.sender().unwrap_or("?");
        let spec = format!(
            "{}/{}/{}",
            field_text(doc.get("origin")),
            field_text(doc.get("description")),
            field_text(doc.get("subSpecification")),
        );

        let mut out = format!("{} {}", sender.style(styles.node), spec.style(styles.label));

        for (key, value) in doc.iter().filter(|(key, _)| !HEADLINE_FIELDS.contains(key)) {
            out.push(' ');
            out.push_str(&format!("{}={}", key, field_text(Some(value))).style(styles.field).to_string());
        }

        match doc.payload() {
            Some(payload) => {
                for line in payload_text(payload).lines() {
                    out.push_str("\n  ");
                    out.push_str(&line.style(styles.payload).to_string());
                }
            }
            None => {
                out.push_str("\n  ");
                out.push_str(&"(payload not rendered)".style(styles.label).to_string());
            }
        }

        out
    }

    fn render_devices_text(&self, devices: &[DeviceInfo]) -> String {
        let styles = ColorStyles::new(self.use_color);

        if devices.is_empty() {
            return "no nodes registered".style(styles.label).to_string();
        }

        let width = devices.iter().map(|d| d.name.len()).max().unwrap_or(0).max(4);
        let mut out = format!(
            "{}",
            format!("{:<width$}  {:<21}  {:<9}  {:>9}  {:>8}", "NODE", "PEER", "INSPECTED", "DOCUMENTS", "UPTIME")
                .style(styles.label)
        );

        for device in devices {
            let inspected = if device.inspected { "yes" } else { "no" };
            out.push_str(&format!(
                "\n{:<width$}  {:<21}  {:<9}  {:>9}  {:>7}s",
                device.name,
                device.peer.to_string(),
                inspected,
                device.documents,
                device.connected_for.as_secs()
            ));
        }
        out
    }
}

/// Scalar fields as plain text, everything else as JSON
fn field_text(value: Option<&Value>) -> String {
    match value {
        None => "-".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Payload body for text output
///
/// Table summaries print their preview; hex dumps print as is.
fn payload_text(payload: &Value) -> String {
    match payload {
        Value::String(s) => s.clone(),
        Value::Object(map) => match map.get("preview") {
            Some(Value::String(preview)) => preview.clone(),
            _ => serde_json::to_string_pretty(payload).unwrap_or_default(),
        },
        other => serde_json::to_string_pretty(other).unwrap_or_default(),
    }
}

fn event_json(event: &InspectorEvent) -> Value {
    match event {
        InspectorEvent::Registered { node, peer } => json!({
            "event": "registered",
            "node": node,
            "peer": peer.to_string(),
        }),
        InspectorEvent::Deregistered { node, clean } => json!({
            "event": "deregistered",
            "node": node,
            "clean": clean,
        }),
        InspectorEvent::Data { node, payload } => match DisplayDocument::from_json(payload) {
            Ok(doc) => json!({
                "event": "data",
                "node": node,
                "document": doc,
            }),
            Err(e) => json!({
                "event": "data",
                "node": node,
                "error": e.to_string(),
                "bytes": payload.len(),
            }),
        },
    }
}

fn devices_json(devices: &[DeviceInfo]) -> Value {
    Value::Array(
        devices
            .iter()
            .map(|d| {
                json!({
                    "node": d.name,
                    "peer": d.peer.to_string(),
                    "inspected": d.inspected,
                    "documents": d.documents,
                    "connected_secs": d.connected_for.as_secs(),
                })
            })
            .collect(),
    )
}

fn to_json(value: &Value, pretty: bool) -> String {
    let result = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    match result {
        Ok(json) => json,
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize event");
            String::new()
        }
    }
}

#[cfg(test)]
#[path = "output_test.rs"]
mod tests;
