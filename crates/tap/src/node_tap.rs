//! NodeTap - per-node duplication point
//!
//! `NodeTap` sits in a pipeline node's send path. It is the integration point
//! between the host pipeline and inspection:
//!
//! - Zero work while the inspector has not asked for this node (inline check)
//! - Every part duplicated into fresh buffers, the original only borrowed
//! - Duplicates go out on the node's reserved inspector channel, never
//!   blocking the node
//! - A failed forward turns inspection off locally until the next INSPECT_ON
//!
//! # Usage
//!
//! ```ignore
//! let tap = NodeTap::connect("tpc-clusterer", &config, router).await;
//! tap.reserve_channel(inspector_channel_name("tpc-clusterer"))?;
//!
//! // Once per processing step:
//! tap.poll().await;
//!
//! // In the send path, before handing `message` to its real consumers:
//! tap.forward(&message);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use spyglass_config::InspectorConfig;
use spyglass_protocol::FrameType;
use tracing::{debug, trace, warn};

use crate::channel::{ChannelId, OutputChannels};
use crate::error::Result;
use crate::message::{Multipart, TappedMessage};
use crate::service::InspectionService;

/// Duplication point for one pipeline node
#[derive(Debug)]
pub struct NodeTap<C: OutputChannels> {
    node_name: String,
    /// `None` when inspection is off or the inspector was unreachable
    service: Option<InspectionService>,
    channels: C,
    /// Messages duplicated and handed to the channel
    forwarded: AtomicU64,
    /// Forwards the channel refused
    failed: AtomicU64,
}

impl<C: OutputChannels> NodeTap<C> {
    /// Connect to the inspector, or run uninspected
    ///
    /// Never fails: if inspection is disabled in `config` or the inspector
    /// is not listening, the tap is inert and `forward` is a no-op.
    pub async fn connect(node_name: impl Into<String>, config: &InspectorConfig, channels: C) -> Self {
        let node_name = node_name.into();

        if !config.enabled {
            debug!(node = %node_name, "inspection disabled");
            return Self::uninspected(node_name, channels);
        }

        match InspectionService::connect(node_name.as_str(), config).await {
            Ok(service) => Self::with_service(service, channels),
            Err(e) => {
                warn!(
                    node = %node_name,
                    endpoint = %config.endpoint(),
                    error = %e,
                    "inspector unreachable, running uninspected"
                );
                Self::uninspected(node_name, channels)
            }
        }
    }

    /// Tap backed by an already connected service
    pub fn with_service(service: InspectionService, channels: C) -> Self {
        Self {
            node_name: service.node_name().to_string(),
            service: Some(service),
            channels,
            forwarded: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    /// Inert tap
    pub fn uninspected(node_name: impl Into<String>, channels: C) -> Self {
        Self {
            node_name: node_name.into(),
            service: None,
            channels,
            forwarded: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    /// Whether the inspector connection is up
    #[inline]
    pub fn is_connected(&self) -> bool {
        self.service.as_ref().is_some_and(InspectionService::is_connected)
    }

    /// Whether duplicates are currently wanted
    #[inline]
    pub fn is_inspected(&self) -> bool {
        self.service.as_ref().is_some_and(InspectionService::is_inspected)
    }

    pub fn service(&self) -> Option<&InspectionService> {
        self.service.as_ref()
    }

    pub fn channels(&self) -> &C {
        &self.channels
    }

    /// Reserve the channel duplicates are sent on
    ///
    /// Ignored on an inert tap.
    pub fn reserve_channel(&self, channel: ChannelId) -> Result<()> {
        match &self.service {
            Some(service) => service.set_target_channel(channel),
            None => Ok(()),
        }
    }

    /// Handle a pending control frame, if any
    pub async fn poll(&mut self) -> Option<FrameType> {
        match self.service.as_mut() {
            Some(service) => service.receive().await,
            None => None,
        }
    }

    /// Duplicate `message` onto the inspector channel
    ///
    /// This is the hot path. Returns `true` if a duplicate was handed to the
    /// channel. `message` is only read.
    #[inline]
    pub fn forward(&self, message: &Multipart) -> bool {
        let Some(service) = &self.service else {
            return false;
        };
        if !service.is_inspected() {
            return false;
        }
        let Some(channel) = service.target_channel() else {
            return false;
        };

        let tapped = TappedMessage::new(self.node_name.as_str(), message.duplicate());

        match self.channels.send(channel, tapped) {
            Ok(()) => {
                self.forwarded.fetch_add(1, Ordering::Relaxed);
                trace!(node = %self.node_name, channel = %channel, parts = message.len(), "forwarded to inspector");
                true
            }
            Err(e) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                warn!(node = %self.node_name, channel = %channel, error = %e, "forward to inspector failed");
                service.disable_inspection();
                false
            }
        }
    }

    /// Deregister from the inspector
    pub async fn shutdown(self) {
        if let Some(service) = self.service {
            service.shutdown().await;
        }
    }

    pub fn stats(&self) -> NodeTapStats {
        NodeTapStats {
            forwarded: self.forwarded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Statistics about a node tap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeTapStats {
    /// Messages duplicated onto the inspector channel
    pub forwarded: u64,
    /// Forwards refused by the channel
    pub failed: u64,
}

#[cfg(test)]
#[path = "node_tap_test.rs"]
mod tests;
