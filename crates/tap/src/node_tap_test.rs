//! Tests for NodeTap

use std::time::Duration;

use parking_lot::Mutex;
use spyglass_protocol::{Connection, Frame};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};

use super::*;
use crate::channel::ChannelRouter;
use crate::error::TapError;
use crate::headers::{DataHeader, HeaderBlock};
use crate::message::MessagePart;

// ============================================================================
// Helper Functions
// ============================================================================

/// Records every send, or refuses all of them
#[derive(Debug, Default)]
struct RecordingChannels {
    sent: Mutex<Vec<(ChannelId, TappedMessage)>>,
    refuse: bool,
}

impl OutputChannels for RecordingChannels {
    fn send(&self, channel: &ChannelId, message: TappedMessage) -> Result<()> {
        if self.refuse {
            return Err(TapError::ChannelFull {
                channel: channel.to_string(),
            });
        }
        self.sent.lock().push((channel.clone(), message));
        Ok(())
    }
}

fn config_for(listener: &TcpListener) -> InspectorConfig {
    InspectorConfig {
        enabled: true,
        port: listener.local_addr().unwrap().port(),
        ..Default::default()
    }
}

async fn connected_tap<C: OutputChannels>(name: &str, channels: C) -> (NodeTap<C>, Connection<TcpStream>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let config = config_for(&listener);
    let (tap, accepted) = tokio::join!(NodeTap::connect(name, &config, channels), listener.accept());
    (tap, Connection::new(accepted.unwrap().0))
}

/// Send INSPECT_ON and poll until the tap has seen it
async fn turn_on<C: OutputChannels>(tap: &mut NodeTap<C>, inspector: &mut Connection<TcpStream>) {
    inspector.send(&Frame::inspect_on()).await.unwrap();
    for _ in 0..300 {
        if tap.poll().await == Some(FrameType::InspectOn) {
            return;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("tap never saw INSPECT_ON");
}

fn message() -> Multipart {
    Multipart::from(vec![
        MessagePart::from_blocks(&[HeaderBlock::Data(DataHeader::new("TPC", "CLUSTERS", 0))], b"one"),
        MessagePart::from_blocks(&[HeaderBlock::Data(DataHeader::new("TPC", "TRACKS", 0))], b"two"),
    ])
}

// ============================================================================
// Inert taps
// ============================================================================

#[tokio::test]
async fn test_disabled_config_is_inert() {
    let config = InspectorConfig::default();
    let mut tap = NodeTap::connect("A", &config, RecordingChannels::default()).await;

    assert!(!tap.is_connected());
    assert!(!tap.is_inspected());
    assert!(tap.poll().await.is_none());
    assert!(tap.reserve_channel(ChannelId::new("x")).is_ok());
    assert!(!tap.forward(&message()));
    assert!(tap.channels().sent.lock().is_empty());
}

#[tokio::test]
async fn test_unreachable_inspector_runs_uninspected() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let config = config_for(&listener);
    drop(listener);

    let tap = NodeTap::connect("A", &config, RecordingChannels::default()).await;
    assert!(!tap.is_connected());
    assert_eq!(tap.node_name(), "A");
    assert!(!tap.forward(&message()));
}

// ============================================================================
// Forwarding
// ============================================================================

#[tokio::test]
async fn test_not_inspected_does_nothing() {
    let (tap, _inspector) = connected_tap("A", RecordingChannels::default()).await;
    tap.reserve_channel(ChannelId::new("from_A_to_DataInspector")).unwrap();

    assert!(tap.is_connected());
    assert!(!tap.forward(&message()));
    assert_eq!(tap.stats().forwarded, 0);
}

#[tokio::test]
async fn test_inspected_without_channel_does_nothing() {
    let (mut tap, mut inspector) = connected_tap("A", RecordingChannels::default()).await;
    turn_on(&mut tap, &mut inspector).await;

    assert!(tap.is_inspected());
    assert!(!tap.forward(&message()));
    assert!(tap.channels().sent.lock().is_empty());
}

#[tokio::test]
async fn test_forward_duplicates_message() {
    let (mut tap, mut inspector) = connected_tap("A", RecordingChannels::default()).await;
    let channel = ChannelId::new("from_A_to_DataInspector");
    tap.reserve_channel(channel.clone()).unwrap();
    turn_on(&mut tap, &mut inspector).await;

    let original = message();
    assert!(tap.forward(&original));

    let mut sent = tap.channels().sent.lock();
    assert_eq!(sent.len(), 1);
    let (to, tapped) = &mut sent[0];
    assert_eq!(*to, channel);
    assert_eq!(tapped.sender, "A");
    assert_eq!(tapped.message, original);

    // The duplicate owns its bytes
    tapped.message.parts_mut()[0].payload[0] = b'X';
    assert_eq!(&original.parts()[0].payload[..], b"one");
    drop(sent);

    assert_eq!(tap.stats().forwarded, 1);
}

#[tokio::test]
async fn test_failed_forward_disables_inspection() {
    let channels = RecordingChannels {
        refuse: true,
        ..Default::default()
    };
    let (mut tap, mut inspector) = connected_tap("A", channels).await;
    tap.reserve_channel(ChannelId::new("from_A_to_DataInspector")).unwrap();
    turn_on(&mut tap, &mut inspector).await;

    assert!(!tap.forward(&message()));
    assert!(!tap.is_inspected());
    assert_eq!(tap.stats(), NodeTapStats { forwarded: 0, failed: 1 });

    // Next forward is a no-op until the inspector asks again
    assert!(!tap.forward(&message()));
    assert_eq!(tap.stats().failed, 1);

    turn_on(&mut tap, &mut inspector).await;
    assert!(tap.is_inspected());
}

#[tokio::test]
async fn test_forward_through_router() {
    let channel = ChannelId::new("from_A_to_DataInspector");
    let mut router = ChannelRouter::new();
    let mut rx: mpsc::Receiver<TappedMessage> = router.open(channel.clone(), 4);

    let (mut tap, mut inspector) = connected_tap("A", router).await;
    tap.reserve_channel(channel).unwrap();
    turn_on(&mut tap, &mut inspector).await;

    assert!(tap.forward(&message()));
    let tapped = timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
    assert_eq!(tapped.sender, "A");
    assert_eq!(tapped.message.len(), 2);
}

#[tokio::test]
async fn test_shutdown_deregisters() {
    let (tap, mut inspector) = connected_tap("A", RecordingChannels::default()).await;
    tap.shutdown().await;

    assert_eq!(inspector.receive().await.unwrap().frame_type, FrameType::DeviceOn);
    assert_eq!(inspector.receive().await.unwrap().frame_type, FrameType::DeviceOff);
}
