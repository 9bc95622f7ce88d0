//! Inspector server for node connections
//!
//! `InspectorServer` listens on the inspector endpoint and handles one
//! pipeline node per connection. Each node announces itself with
//! `DeviceOn`, is registered in the `DeviceRegistry`, and from then on its
//! DATA frames are surfaced as `InspectorEvent`s.
//!
//! # Protocol
//!
//! Node → Inspector:
//! - `DeviceOn` - registration, payload is the node name
//! - `Data` - a serialized Display Document
//! - `DeviceOff` - deregistration
//!
//! Inspector → Node:
//! - `InspectOn` / `InspectOff` - queued through `InspectorHandle::set_inspected`
//!
//! Nodes named in `inspect` (or all nodes with `inspect_all`) receive
//! `InspectOn` right after they register.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use spyglass_config::InspectorConfig;
use spyglass_protocol::{
    Acceptor, AcceptorHandle, AcceptorSnapshot, Connection, Frame, FrameType, ProtocolError,
};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::document::DisplayDocument;
use crate::error::Result;
use crate::registry::{ControlCommand, DeviceInfo, DeviceRegistry};

/// Events buffered between connection handlers and the consumer
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Something that happened on a node connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InspectorEvent {
    /// Node announced itself
    Registered { node: String, peer: SocketAddr },
    /// DATA frame from a node
    Data { node: String, payload: Bytes },
    /// Node left; `clean` is false when the connection dropped without `DeviceOff`
    Deregistered { node: String, clean: bool },
}

impl InspectorEvent {
    pub fn node(&self) -> &str {
        match self {
            Self::Registered { node, .. } | Self::Data { node, .. } | Self::Deregistered { node, .. } => {
                node
            }
        }
    }

    /// Parse a DATA payload as a Display Document
    pub fn document(&self) -> Option<Result<DisplayDocument>> {
        match self {
            Self::Data { payload, .. } => Some(DisplayDocument::from_json(payload)),
            _ => None,
        }
    }
}

/// TCP server that nodes register with
#[derive(Debug)]
pub struct InspectorServer {
    acceptor: Acceptor,
    context: Arc<ConnectionContext>,
}

/// Cloneable handle for controlling a running server
#[derive(Debug, Clone)]
pub struct InspectorHandle {
    registry: Arc<DeviceRegistry>,
    acceptor: AcceptorHandle,
    local_addr: SocketAddr,
}

#[derive(Debug)]
struct ConnectionContext {
    config: InspectorConfig,
    registry: Arc<DeviceRegistry>,
    events: mpsc::Sender<InspectorEvent>,
}

impl InspectorServer {
    /// Bind the configured endpoint
    ///
    /// Returns the server and the receiver its events arrive on.
    pub async fn bind(config: InspectorConfig) -> Result<(Self, mpsc::Receiver<InspectorEvent>)> {
        Self::bind_with_capacity(config, DEFAULT_EVENT_CAPACITY).await
    }

    pub async fn bind_with_capacity(
        config: InspectorConfig,
        event_capacity: usize,
    ) -> Result<(Self, mpsc::Receiver<InspectorEvent>)> {
        let acceptor = Acceptor::bind(&config.address, config.port).await?;
        let (events, receiver) = mpsc::channel(event_capacity);

        let context = Arc::new(ConnectionContext {
            config,
            registry: Arc::new(DeviceRegistry::new()),
            events,
        });

        Ok((Self { acceptor, context }, receiver))
    }

    /// Address the server is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.acceptor.local_addr()
    }

    pub fn registry(&self) -> Arc<DeviceRegistry> {
        Arc::clone(&self.context.registry)
    }

    pub fn handle(&self) -> InspectorHandle {
        InspectorHandle {
            registry: self.registry(),
            acceptor: self.acceptor.handle(),
            local_addr: self.local_addr(),
        }
    }

    /// Run the server
    ///
    /// This method returns once the server is stopped through a handle.
    pub async fn run(self) -> Result<()> {
        info!(
            address = %self.acceptor.local_addr(),
            inspect_all = self.context.config.inspect_all,
            preselected = self.context.config.inspect.len(),
            "inspector listening"
        );

        let context = self.context;
        self.acceptor
            .run(move |conn, peer| {
                let context = Arc::clone(&context);
                async move { handle_connection(conn, peer, context).await }
            })
            .await?;

        Ok(())
    }

    /// Start the server in a background task
    pub fn spawn(self) -> tokio::task::JoinHandle<Result<()>> {
        tokio::spawn(self.run())
    }
}

impl InspectorHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Send INSPECT_ON or INSPECT_OFF to a registered node
    pub fn set_inspected(&self, node: &str, on: bool) -> Result<()> {
        self.registry.set_inspected(node, on)
    }

    /// Send INSPECT_ON or INSPECT_OFF to every registered node
    pub fn set_all_inspected(&self, on: bool) -> usize {
        self.registry.set_all_inspected(on)
    }

    pub fn devices(&self) -> Vec<DeviceInfo> {
        self.registry.list()
    }

    /// Stop accepting nodes; registered nodes stay connected
    pub fn stop(&self) {
        self.acceptor.stop();
    }

    pub fn is_running(&self) -> bool {
        self.acceptor.is_running()
    }

    pub fn stats(&self) -> AcceptorSnapshot {
        self.acceptor.stats()
    }
}

impl ConnectionContext {
    async fn emit(&self, event: InspectorEvent) {
        if self.events.send(event).await.is_err() {
            trace!("inspector event receiver gone");
        }
    }
}

/// What woke the per-node loop
enum Step {
    Frame(spyglass_protocol::Result<Frame>),
    Control(Option<ControlCommand>),
}

/// Handle a single node connection
async fn handle_connection(
    mut conn: Connection<TcpStream>,
    peer: SocketAddr,
    context: Arc<ConnectionContext>,
) -> spyglass_protocol::Result<()> {
    debug!(%peer, "node connected");

    let node = wait_for_registration(&mut conn).await?;
    let (id, mut control) = context.registry.register(&node, peer);

    info!(node = %node, %peer, "node registered");
    context
        .emit(InspectorEvent::Registered {
            node: node.clone(),
            peer,
        })
        .await;

    if context.config.preselects(&node)
        && let Err(e) = context.registry.set_inspected(&node, true)
    {
        warn!(node = %node, error = %e, "failed to preselect node");
    }

    let clean = serve_node(&mut conn, &node, &mut control, &context).await;

    context.registry.unregister(&node, id);
    conn.close().await;

    info!(node = %node, clean, "node deregistered");
    context.emit(InspectorEvent::Deregistered { node, clean }).await;

    Ok(())
}

/// Read until the node announces itself
async fn wait_for_registration(conn: &mut Connection<TcpStream>) -> spyglass_protocol::Result<String> {
    loop {
        match conn.receive().await {
            Ok(frame) if frame.frame_type == FrameType::DeviceOn => {
                let name = frame.payload_str()?;
                if name.is_empty() {
                    return Err(ProtocolError::invalid_payload("empty node name"));
                }
                return Ok(name.to_string());
            }
            Ok(frame) => {
                debug!(frame_type = %frame.frame_type, "frame before registration ignored");
            }
            Err(e) if e.is_recoverable() => {
                warn!(error = %e, "ignoring frame before registration");
            }
            Err(e) => return Err(e),
        }
    }
}

/// Relay frames and control commands until the node leaves
///
/// Returns true if the node sent `DeviceOff`.
async fn serve_node(
    conn: &mut Connection<TcpStream>,
    node: &str,
    control: &mut mpsc::Receiver<ControlCommand>,
    context: &ConnectionContext,
) -> bool {
    let mut control_open = true;

    loop {
        let step = tokio::select! {
            frame = conn.receive() => Step::Frame(frame),
            command = control.recv(), if control_open => Step::Control(command),
        };

        match step {
            Step::Frame(Ok(frame)) => match frame.frame_type {
                FrameType::Data => {
                    trace!(node, len = frame.payload_len(), "data from node");
                    context.registry.record_document(node);
                    context
                        .emit(InspectorEvent::Data {
                            node: node.to_string(),
                            payload: frame.payload,
                        })
                        .await;
                }
                FrameType::DeviceOff => return true,
                FrameType::DeviceOn => {
                    warn!(node, "duplicate registration ignored");
                }
                FrameType::InspectOn | FrameType::InspectOff => {
                    warn!(node, frame_type = %frame.frame_type, "control frame from node ignored");
                }
            },
            Step::Frame(Err(e)) if e.is_recoverable() => {
                warn!(node, error = %e, "ignoring frame from node");
            }
            Step::Frame(Err(ProtocolError::ConnectionClosed)) => {
                info!(node, "node disconnected without deregistering");
                return false;
            }
            Step::Frame(Err(e)) => {
                warn!(node, error = %e, "node connection failed");
                return false;
            }
            Step::Control(Some(command)) => {
                debug!(node, ?command, "sending control frame");
                if let Err(e) = conn.send(&command.to_frame()).await {
                    warn!(node, error = %e, "failed to send control frame");
                    return false;
                }
            }
            Step::Control(None) => {
                debug!(node, "control channel closed, node re-registered elsewhere");
                control_open = false;
            }
        }
    }
}

#[cfg(test)]
#[path = "server_test.rs"]
mod tests;
