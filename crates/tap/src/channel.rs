//! Output channels a node can hand duplicated messages to
//!
//! The host pipeline owns the real channels; taps only see them through
//! `OutputChannels`. `ChannelRouter` is the in-process implementation: named
//! tokio `mpsc` senders, written with `try_send` so a slow inspector never
//! stalls the node.

use std::collections::HashMap;
use std::fmt;

use tokio::sync::mpsc;
use tracing::trace;

use crate::error::{Result, TapError};
use crate::message::TappedMessage;

/// Name of a pipeline output channel
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(String);

impl ChannelId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChannelId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ChannelId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Where a node sends messages it does not deliver itself
pub trait OutputChannels {
    /// Send without waiting; fails if the channel is full, closed or unknown
    fn send(&self, channel: &ChannelId, message: TappedMessage) -> Result<()>;
}

/// Named `mpsc` senders
#[derive(Debug, Default, Clone)]
pub struct ChannelRouter {
    senders: HashMap<ChannelId, mpsc::Sender<TappedMessage>>,
}

impl ChannelRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sender under `channel`, replacing any previous one
    pub fn register(&mut self, channel: ChannelId, sender: mpsc::Sender<TappedMessage>) {
        self.senders.insert(channel, sender);
    }

    /// Create a bounded channel, register its sender and return the receiver
    pub fn open(&mut self, channel: ChannelId, capacity: usize) -> mpsc::Receiver<TappedMessage> {
        let (tx, rx) = mpsc::channel(capacity);
        self.register(channel, tx);
        rx
    }

    pub fn unregister(&mut self, channel: &ChannelId) -> Option<mpsc::Sender<TappedMessage>> {
        self.senders.remove(channel)
    }

    pub fn contains(&self, channel: &ChannelId) -> bool {
        self.senders.contains_key(channel)
    }

    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }
}

impl OutputChannels for ChannelRouter {
    fn send(&self, channel: &ChannelId, message: TappedMessage) -> Result<()> {
        let sender = self
            .senders
            .get(channel)
            .ok_or_else(|| TapError::UnknownChannel {
                channel: channel.to_string(),
            })?;

        sender.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => TapError::ChannelFull {
                channel: channel.to_string(),
            },
            mpsc::error::TrySendError::Closed(_) => TapError::ChannelClosed {
                channel: channel.to_string(),
            },
        })?;

        trace!(%channel, "message queued");
        Ok(())
    }
}

#[cfg(test)]
#[path = "channel_test.rs"]
mod tests;
