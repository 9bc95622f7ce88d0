//! Tests for Observer

use std::time::Duration;

use spyglass_config::InspectorConfig;
use spyglass_protocol::{Connection, Frame, FrameType};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

use super::*;
use crate::document::DisplayDocument;
use crate::headers::{DataHeader, HeaderBlock};
use crate::message::Multipart;
use crate::workflow::ConcreteDataMatcher;

// ============================================================================
// Helper Functions
// ============================================================================

async fn connected_observer() -> (Observer, Connection<TcpStream>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let config = InspectorConfig {
        enabled: true,
        port: listener.local_addr().unwrap().port(),
        ..Default::default()
    };
    let (service, accepted) = tokio::join!(
        InspectionService::connect("DataInspector", &config),
        listener.accept()
    );
    let mut inspector = Connection::new(accepted.unwrap().0);

    let on = next_frame(&mut inspector).await;
    assert_eq!(on.frame_type, FrameType::DeviceOn);

    (Observer::with_default_renderers(service.unwrap()), inspector)
}

async fn next_frame(conn: &mut Connection<TcpStream>) -> Frame {
    timeout(Duration::from_secs(5), conn.receive())
        .await
        .expect("inspector receive timed out")
        .unwrap()
}

async fn next_document(conn: &mut Connection<TcpStream>) -> DisplayDocument {
    let frame = next_frame(conn).await;
    assert_eq!(frame.frame_type, FrameType::Data);
    DisplayDocument::from_json(&frame.payload).unwrap()
}

fn part(payload: &[u8]) -> MessagePart {
    MessagePart::from_blocks(
        &[HeaderBlock::Data(DataHeader::new("TPC", "CLUSTERS", 1))],
        payload,
    )
}

// ============================================================================
// Observing
// ============================================================================

#[tokio::test]
async fn test_observe_sends_document() {
    let (mut observer, mut inspector) = connected_observer().await;

    observer.observe("producer", &part(&[0x00, 0x7f])).await.unwrap();

    let doc = next_document(&mut inspector).await;
    assert_eq!(doc.sender(), Some("producer"));
    assert_eq!(doc.get("origin").and_then(|v| v.as_str()), Some("TPC"));
    assert_eq!(doc.payload().and_then(|v| v.as_str()), Some("80 ff"));
    assert_eq!(observer.stats().documents_sent, 1);
}

#[tokio::test]
async fn test_observe_message_one_frame_per_part() {
    let (mut observer, mut inspector) = connected_observer().await;

    let message: Multipart = vec![part(b"a"), part(b"b"), part(b"c")].into();
    let sent = observer
        .observe_message(&TappedMessage::new("producer", message))
        .await;
    assert_eq!(sent, 3);

    for expected in ["e1", "e2", "e3"] {
        let doc = next_document(&mut inspector).await;
        assert_eq!(doc.sender(), Some("producer"));
        assert_eq!(doc.payload().and_then(|v| v.as_str()), Some(expected));
    }
}

#[tokio::test]
async fn test_observe_input_names_sender_from_route() {
    let (mut observer, mut inspector) = connected_observer().await;

    let input = InputSpec {
        binding: "clusters".into(),
        matcher: ConcreteDataMatcher::new("TPC", "CLUSTERS", 1),
        lifetime: Default::default(),
    };
    let routes = vec![InputRoute {
        matcher: input.clone(),
        source_channel: "from_clusterer_to_DataInspector".into(),
    }];

    observer.observe_input(&routes, &input, &part(b"x")).await.unwrap();
    observer.observe_input(&[], &input, &part(b"x")).await.unwrap();

    assert_eq!(next_document(&mut inspector).await.sender(), Some("clusterer"));
    assert_eq!(next_document(&mut inspector).await.sender(), Some(UNKNOWN_SENDER));
}

// ============================================================================
// Run loop
// ============================================================================

#[tokio::test]
async fn test_run_drains_then_deregisters() {
    let (observer, mut inspector) = connected_observer().await;
    let (tx, rx) = mpsc::channel(8);

    let task = tokio::spawn(observer.run(rx));

    tx.send(TappedMessage::new("A", vec![part(b"1")].into()))
        .await
        .unwrap();
    tx.send(TappedMessage::new("B", vec![part(b"2"), part(b"3")].into()))
        .await
        .unwrap();
    drop(tx);

    let stats = timeout(Duration::from_secs(5), task).await.unwrap().unwrap();
    assert_eq!(stats.documents_sent, 3);
    assert_eq!(stats.dropped, 0);

    let senders: Vec<String> = vec![
        next_document(&mut inspector).await,
        next_document(&mut inspector).await,
        next_document(&mut inspector).await,
    ]
    .iter()
    .map(|doc| doc.sender().unwrap().to_string())
    .collect();
    assert_eq!(senders, vec!["A", "B", "B"]);

    assert_eq!(next_frame(&mut inspector).await.frame_type, FrameType::DeviceOff);
}

#[tokio::test]
async fn test_lost_inspector_keeps_draining() {
    let (mut observer, inspector) = connected_observer().await;
    drop(inspector);

    // Keep sending until the broken socket is noticed
    for _ in 0..200 {
        observer.observe("A", &part(&[0u8; 1024])).await.unwrap();
        if !observer.is_connected() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(!observer.is_connected());

    let dropped = observer.stats().dropped;
    observer.observe("A", &part(b"late")).await.unwrap();
    assert_eq!(observer.stats().dropped, dropped + 1);
}
