//! Observer - renders tapped traffic and ships it to the inspector
//!
//! The observer is the receiving end of every inspector-bound channel. In
//! route-copy mode it is the synthetic `DataInspector` node fed by the
//! routes `add_observer` planned; in per-node mode it drains the
//! `from_<node>_to_DataInspector` channels that `NodeTap`s forward into.
//! Either way each message part becomes one Display Document sent as one
//! DATA frame.
//!
//! Once the inspector connection breaks the observer keeps draining its
//! channel without sending, so upstream taps never block on it.

use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::document::build_display_document;
use crate::error::Result;
use crate::message::{MessagePart, TappedMessage};
use crate::render::RendererRegistry;
use crate::service::InspectionService;
use crate::workflow::{InputRoute, InputSpec, find_sender_by_route};

/// Sender name used when no route matches an input
pub const UNKNOWN_SENDER: &str = "unknown";

/// Renders message parts into Display Documents and sends them
#[derive(Debug)]
pub struct Observer {
    service: InspectionService,
    renderers: RendererRegistry,
    /// Set after the first transport failure
    disconnected: bool,
    documents_sent: u64,
    dropped: u64,
}

impl Observer {
    pub fn new(service: InspectionService, renderers: RendererRegistry) -> Self {
        Self {
            service,
            renderers,
            disconnected: false,
            documents_sent: 0,
            dropped: 0,
        }
    }

    /// Observer with the default renderers
    pub fn with_default_renderers(service: InspectionService) -> Self {
        Self::new(service, RendererRegistry::new())
    }

    pub fn service(&self) -> &InspectionService {
        &self.service
    }

    /// Whether the inspector connection is still usable
    pub fn is_connected(&self) -> bool {
        !self.disconnected
    }

    /// Render one part and send it as a DATA frame
    pub async fn observe(&mut self, sender: &str, part: &MessagePart) -> Result<()> {
        if self.disconnected {
            self.dropped += 1;
            return Ok(());
        }

        let doc = build_display_document(sender, part, &self.renderers);
        match self.service.send_document(&doc).await {
            Ok(()) => {
                self.documents_sent += 1;
                trace!(sender, fields = doc.len(), "document sent");
                Ok(())
            }
            Err(e) if e.is_transport_error() => {
                warn!(error = %e, "inspector connection lost, dropping further documents");
                self.disconnected = true;
                self.dropped += 1;
                Ok(())
            }
            Err(e) => {
                self.dropped += 1;
                Err(e)
            }
        }
    }

    /// Render a part that arrived on a route, naming the sender from it
    pub async fn observe_input(
        &mut self,
        routes: &[InputRoute],
        input: &InputSpec,
        part: &MessagePart,
    ) -> Result<()> {
        let sender = find_sender_by_route(routes, input).unwrap_or(UNKNOWN_SENDER);
        self.observe(sender, part).await
    }

    /// Send one document per part of a tapped message
    ///
    /// A part that fails to serialize is skipped; the rest still go out.
    pub async fn observe_message(&mut self, tapped: &TappedMessage) -> usize {
        let mut sent = 0;
        for part in &tapped.message {
            match self.observe(&tapped.sender, part).await {
                Ok(()) if !self.disconnected => sent += 1,
                Ok(()) => {}
                Err(e) => warn!(sender = %tapped.sender, error = %e, "skipping message part"),
            }
        }
        sent
    }

    /// Drain `rx` until every sender is gone, then deregister
    pub async fn run(mut self, mut rx: mpsc::Receiver<TappedMessage>) -> ObserverStats {
        info!(node = %self.service.node_name(), "observer started");

        while let Some(tapped) = rx.recv().await {
            let sent = self.observe_message(&tapped).await;
            debug!(sender = %tapped.sender, parts = tapped.message.len(), sent, "observed message");
        }

        let stats = self.stats();
        info!(
            documents_sent = stats.documents_sent,
            dropped = stats.dropped,
            "observer channel closed"
        );
        self.service.shutdown().await;
        stats
    }

    /// Deregister without draining anything further
    pub async fn shutdown(self) {
        self.service.shutdown().await;
    }

    pub fn stats(&self) -> ObserverStats {
        ObserverStats {
            documents_sent: self.documents_sent,
            dropped: self.dropped,
        }
    }
}

/// Statistics about an observer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObserverStats {
    /// Documents delivered to the inspector connection
    pub documents_sent: u64,
    /// Parts not delivered (connection gone or serialization failed)
    pub dropped: u64,
}

#[cfg(test)]
#[path = "observer_test.rs"]
mod tests;
