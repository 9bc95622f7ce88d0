//! Spyglass Tap - live inspection of pipeline traffic
//!
//! This crate connects pipeline nodes to an inspector and lets the inspector
//! switch each node's tap on and off at runtime. It provides:
//!
//! - `InspectionService` - one node's registered connection to the inspector
//! - `NodeTap` - per-node duplication of outgoing messages, zero cost while
//!   the node is not inspected
//! - `Observer` - renders tapped messages into Display Documents and sends
//!   them as DATA frames
//! - `InspectorServer` - the inspector side: registry of connected nodes,
//!   INSPECT_ON/OFF control and a stream of received documents
//!
//! # Architecture
//!
//! ```text
//! Node send path
//!     │
//!     ├──→ real consumers (original message, untouched)
//!     │
//!     └──→ NodeTap.forward() ◄── INSPECT_ON/OFF via InspectionService
//!               │
//!               ▼ duplicate
//!         from_<node>_to_DataInspector
//!               │
//!               ▼
//!          Observer ── render ──→ DATA ──→ InspectorServer
//!                                              │
//!                                              ▼
//!                                       InspectorEvent
//! ```
//!
//! `workflow::plan_taps` picks the mode from configuration. In route-copy
//! mode the observer is instead fed directly by the routes
//! `workflow::add_observer` mirrors.

pub mod channel;
pub mod document;
mod error;
pub mod headers;
pub mod message;
pub mod node_tap;
pub mod observer;
pub mod registry;
pub mod render;
pub mod server;
pub mod service;
pub mod workflow;

pub use channel::{ChannelId, ChannelRouter, OutputChannels};
pub use document::{DisplayDocument, build_display_document};
pub use error::{RenderError, Result, TapError};
pub use headers::{DataHeader, HeaderBlock, SerializationMethod, TaskHeader, TimingHeader};
pub use message::{MessagePart, Multipart, TappedMessage};
pub use node_tap::{NodeTap, NodeTapStats};
pub use observer::{Observer, ObserverStats};
pub use registry::{ControlCommand, DeviceInfo, DeviceRegistry};
pub use render::{PayloadRenderer, RendererRegistry};
pub use server::{InspectorEvent, InspectorHandle, InspectorServer};
pub use service::{InspectionService, ServiceState, ServiceStats};
pub use workflow::{
    NodeSpec, OBSERVER_NODE_NAME, PlannedChannel, TapPlan, add_observer, plan_inspector_channels, plan_taps,
};

pub use spyglass_config::TapMode;
