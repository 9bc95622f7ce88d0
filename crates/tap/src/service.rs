//! Per-node inspection service
//!
//! `InspectionService` owns one node's connection to the inspector. Its
//! lifecycle is a scoped resource:
//!
//! ```text
//! connect ──DEVICE_ON──► Announced ──INSPECT_ON──► Inspected
//!                            │      ◄─INSPECT_OFF─ NotInspected
//!                            ▼
//!              shutdown()/drop ──DEVICE_OFF──► Deregistered
//! ```
//!
//! Exactly one `DeviceOn` is sent on construction and exactly one
//! `DeviceOff` on the way out, whether through `shutdown()`, a plain drop or
//! a panic unwinding through the owner.
//!
//! `receive()` is a poll: it only handles a control frame that has fully
//! arrived and never waits for the rest of one, so a node can call it once
//! per processing step. A broken or desynchronized control stream closes the
//! connection and turns inspection off; the node keeps running.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use bytes::Bytes;
use spyglass_config::InspectorConfig;
use spyglass_protocol::{Connection, Frame, FrameType, ProtocolError};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::channel::ChannelId;
use crate::document::DisplayDocument;
use crate::error::{Result, TapError};

/// Where a service is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    /// Registered, no control frame received yet
    Announced,
    Inspected,
    NotInspected,
    /// `DeviceOff` sent, connection closed
    Deregistered,
}

/// One pipeline node's link to the inspector
#[derive(Debug)]
pub struct InspectionService {
    node_name: String,
    connection: Connection<TcpStream>,
    /// Read by the send path, written by control frames
    inspected: AtomicBool,
    /// Set once any INSPECT_ON/OFF arrived
    control_seen: bool,
    /// Output channel reserved for duplicated traffic
    target_channel: OnceLock<ChannelId>,
    /// Guards the single `DeviceOff`
    deregistered: bool,
    frames_sent: AtomicU64,
    frames_received: AtomicU64,
    send_failures: AtomicU64,
}

impl InspectionService {
    /// Connect to the configured inspector and announce `node_name`
    ///
    /// Fails with a connection error if the inspector is not listening; the
    /// caller decides whether to run the node uninspected.
    pub async fn connect(node_name: impl Into<String>, config: &InspectorConfig) -> Result<Self> {
        let connection = Connection::connect(&config.address, config.port).await?;
        Self::with_connection(node_name, connection).await
    }

    /// Announce `node_name` over an established connection
    pub async fn with_connection(
        node_name: impl Into<String>,
        mut connection: Connection<TcpStream>,
    ) -> Result<Self> {
        let node_name = node_name.into();

        if let Err(e) = connection.send(&Frame::device_on(&node_name)).await {
            connection.close().await;
            return Err(e.into());
        }

        info!(node = %node_name, "registered with inspector");

        Ok(Self {
            node_name,
            connection,
            inspected: AtomicBool::new(false),
            control_seen: false,
            target_channel: OnceLock::new(),
            deregistered: false,
            frames_sent: AtomicU64::new(1),
            frames_received: AtomicU64::new(0),
            send_failures: AtomicU64::new(0),
        })
    }

    #[inline]
    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    /// Whether the inspector currently wants this node's traffic
    #[inline]
    pub fn is_inspected(&self) -> bool {
        self.inspected.load(Ordering::Acquire)
    }

    pub fn state(&self) -> ServiceState {
        if self.deregistered {
            ServiceState::Deregistered
        } else if self.is_inspected() {
            ServiceState::Inspected
        } else if self.control_seen {
            ServiceState::NotInspected
        } else {
            ServiceState::Announced
        }
    }

    /// Stop duplicating locally, e.g. after a failed send
    ///
    /// A later `INSPECT_ON` turns inspection back on.
    pub fn disable_inspection(&self) {
        if self.inspected.swap(false, Ordering::AcqRel) {
            info!(node = %self.node_name, "inspection disabled locally");
        }
    }

    /// Reserve the output channel duplicated traffic goes to
    ///
    /// Can only be set once.
    pub fn set_target_channel(&self, channel: ChannelId) -> Result<()> {
        self.target_channel.set(channel).map_err(|_| TapError::TargetChannelAlreadySet {
            current: self
                .target_channel
                .get()
                .map(ChannelId::to_string)
                .unwrap_or_default(),
        })
    }

    pub fn target_channel(&self) -> Option<&ChannelId> {
        self.target_channel.get()
    }

    /// Handle one control frame if one is waiting
    ///
    /// Returns the type of the frame handled, or `None` when no complete
    /// frame was buffered. Unknown frame types are logged and skipped; any
    /// other read failure drops the connection.
    pub async fn receive(&mut self) -> Option<FrameType> {
        if self.deregistered || self.connection.is_closed() {
            return None;
        }

        match self.connection.try_receive() {
            Ok(Some(frame)) => {
                self.frames_received.fetch_add(1, Ordering::Relaxed);
                self.handle_frame(&frame);
                Some(frame.frame_type)
            }
            Ok(None) => None,
            Err(e @ ProtocolError::UnknownFrameType { .. }) => {
                warn!(node = %self.node_name, error = %e, "ignoring frame from inspector");
                None
            }
            Err(e) => {
                warn!(node = %self.node_name, error = %e, "control stream lost, closing inspector connection");
                self.disable_inspection();
                self.connection.close().await;
                None
            }
        }
    }

    /// Whether the control connection is still open
    #[inline]
    pub fn is_connected(&self) -> bool {
        !self.deregistered && !self.connection.is_closed()
    }

    fn handle_frame(&mut self, frame: &Frame) {
        match frame.frame_type {
            FrameType::InspectOn => {
                self.control_seen = true;
                self.inspected.store(true, Ordering::Release);
                info!(node = %self.node_name, "inspection on");
            }
            FrameType::InspectOff => {
                self.control_seen = true;
                self.inspected.store(false, Ordering::Release);
                info!(node = %self.node_name, "inspection off");
            }
            other => {
                warn!(node = %self.node_name, frame_type = %other, "unexpected frame from inspector");
            }
        }
    }

    /// Send a DATA frame
    ///
    /// Failures are returned; the caller should disable inspection rather
    /// than stop the node.
    pub async fn send(&mut self, payload: impl Into<Bytes>) -> Result<()> {
        if self.deregistered {
            return Err(ProtocolError::ConnectionClosed.into());
        }

        match self.connection.send(&Frame::data(payload)).await {
            Ok(()) => {
                self.frames_sent.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(e) => {
                self.send_failures.fetch_add(1, Ordering::Relaxed);
                warn!(node = %self.node_name, error = %e, "failed to send to inspector");
                Err(e.into())
            }
        }
    }

    /// Serialize a display document and send it as DATA
    pub async fn send_document(&mut self, doc: &DisplayDocument) -> Result<()> {
        let payload = doc.to_json()?;
        self.send(payload).await
    }

    /// Deregister and close, waiting for both
    pub async fn shutdown(mut self) {
        self.deregister().await;
    }

    async fn deregister(&mut self) {
        if self.deregistered {
            return;
        }
        self.deregistered = true;
        self.inspected.store(false, Ordering::Release);

        match self.connection.send(&Frame::device_off(&self.node_name)).await {
            Ok(()) => {
                self.frames_sent.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => debug!(node = %self.node_name, error = %e, "deregistration not delivered"),
        }
        self.connection.close().await;

        info!(node = %self.node_name, "deregistered from inspector");
    }

    pub fn stats(&self) -> ServiceStats {
        ServiceStats {
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
        }
    }
}

impl Drop for InspectionService {
    fn drop(&mut self) {
        if self.deregistered {
            return;
        }
        self.deregistered = true;

        // Cannot await here; the socket is dropped (and closed) right after.
        match self.connection.try_send_now(&Frame::device_off(&self.node_name)) {
            Ok(()) => debug!(node = %self.node_name, "deregistered on drop"),
            Err(e) => debug!(node = %self.node_name, error = %e, "deregistration on drop not delivered"),
        }
    }
}

/// Frame counters for one service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceStats {
    /// Frames written, `DeviceOn`/`DeviceOff` included
    pub frames_sent: u64,
    /// Control frames read
    pub frames_received: u64,
    /// DATA sends that failed
    pub send_failures: u64,
}

#[cfg(test)]
#[path = "service_test.rs"]
mod tests;
