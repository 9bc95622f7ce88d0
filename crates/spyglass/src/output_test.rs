//! Tests for output formatting

use std::net::SocketAddr;
use std::time::Duration;

use spyglass_tap::DisplayDocument;

use super::*;

fn plain(format: &str) -> Formatter {
    Formatter::new(format).with_color(false)
}

fn peer() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 40000))
}

fn data_event() -> InspectorEvent {
    let mut doc = DisplayDocument::new();
    doc.insert("sender", "tpc-clusterer");
    doc.insert("origin", "TPC");
    doc.insert("description", "CLUSTERS");
    doc.insert("subSpecification", 3);
    doc.insert("tfCounter", 7);
    doc.insert("payload", "80 81 82");

    InspectorEvent::Data {
        node: "DataInspector".into(),
        payload: doc.to_json().unwrap().into(),
    }
}

// =============================================================================
// Format selection
// =============================================================================

#[test]
fn test_format_parse() {
    assert_eq!(Format::parse("json"), Format::Json);
    assert_eq!(Format::parse("C"), Format::Compact);
    assert_eq!(Format::parse("text"), Format::Text);
    assert_eq!(Format::parse("whatever"), Format::Text);
}

// =============================================================================
// Text
// =============================================================================

#[test]
fn test_text_lifecycle() {
    let formatter = plain("text");

    let registered = InspectorEvent::Registered {
        node: "A".into(),
        peer: peer(),
    };
    assert_eq!(formatter.render(&registered), "+ A registered from 127.0.0.1:40000");

    let clean = InspectorEvent::Deregistered {
        node: "A".into(),
        clean: true,
    };
    assert_eq!(formatter.render(&clean), "- A deregistered");

    let lost = InspectorEvent::Deregistered {
        node: "A".into(),
        clean: false,
    };
    assert_eq!(formatter.render(&lost), "- A connection lost");
}

#[test]
fn test_text_document() {
    let text = plain("text").render(&data_event());
    let lines: Vec<&str> = text.lines().collect();

    assert_eq!(lines, vec!["tpc-clusterer TPC/CLUSTERS/3 tfCounter=7", "  80 81 82"]);
}

#[test]
fn test_text_document_without_payload() {
    let mut doc = DisplayDocument::new();
    doc.insert("sender", "A");
    let event = InspectorEvent::Data {
        node: "A".into(),
        payload: doc.to_json().unwrap().into(),
    };

    let text = plain("text").render(&event);
    assert!(text.starts_with("A -/-/-"));
    assert!(text.ends_with("(payload not rendered)"));
}

#[test]
fn test_text_table_preview() {
    let mut doc = DisplayDocument::new();
    doc.insert("sender", "A");
    doc.insert(
        "payload",
        json!({ "columns": [], "rows": 1, "preview": "+---+\n| x |\n+---+" }),
    );
    let event = InspectorEvent::Data {
        node: "A".into(),
        payload: doc.to_json().unwrap().into(),
    };

    let text = plain("text").render(&event);
    assert!(text.contains("\n  | x |\n"));
}

#[test]
fn test_text_unreadable_document() {
    let event = InspectorEvent::Data {
        node: "A".into(),
        payload: b"not json".to_vec().into(),
    };
    let text = plain("text").render(&event);
    assert!(text.starts_with("A unreadable document (8 bytes)"));
}

// =============================================================================
// JSON
// =============================================================================

#[test]
fn test_compact_document() {
    let line = plain("compact").render(&data_event());
    assert!(!line.contains('\n'));

    let value: Value = serde_json::from_str(&line).unwrap();
    assert_eq!(value["event"], "data");
    assert_eq!(value["document"]["sender"], "tpc-clusterer");
    assert_eq!(value["document"]["payload"], "80 81 82");
}

#[test]
fn test_json_lifecycle() {
    let event = InspectorEvent::Deregistered {
        node: "A".into(),
        clean: false,
    };
    let value: Value = serde_json::from_str(&plain("json").render(&event)).unwrap();
    assert_eq!(value, json!({ "event": "deregistered", "node": "A", "clean": false }));
}

// =============================================================================
// Devices
// =============================================================================

#[test]
fn test_devices_text() {
    let devices = vec![DeviceInfo {
        name: "tpc-clusterer".into(),
        peer: peer(),
        connected_for: Duration::from_secs(12),
        inspected: true,
        documents: 40,
    }];

    let text = plain("text").render_devices(&devices);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("NODE"));
    assert!(lines[1].starts_with("tpc-clusterer  127.0.0.1:40000"));
    assert!(lines[1].contains("yes"));
    assert!(lines[1].ends_with("12s"));

    assert_eq!(plain("text").render_devices(&[]), "no nodes registered");
}

#[test]
fn test_devices_json() {
    let devices = vec![DeviceInfo {
        name: "A".into(),
        peer: peer(),
        connected_for: Duration::from_secs(1),
        inspected: false,
        documents: 0,
    }];

    let value: Value = serde_json::from_str(&plain("compact").render_devices(&devices)).unwrap();
    assert_eq!(value[0]["node"], "A");
    assert_eq!(value[0]["inspected"], false);
}
