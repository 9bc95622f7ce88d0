//! Device registry for the inspector side
//!
//! Each registered node gets a `DeviceEntry` that tracks:
//! - Unique connection ID (a node reconnecting under the same name gets a
//!   new one, so a stale handler cannot unregister its successor)
//! - Peer address and registration time
//! - Whether INSPECT_ON is in effect
//! - Control sender the node's connection handler listens on
//!
//! The `DeviceRegistry` handles registration, removal and control fan-out.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use spyglass_protocol::Frame;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::{Result, TapError};

/// Counter for generating unique connection IDs
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Control commands queued per node
const CONTROL_BUFFER_SIZE: usize = 16;

/// Command for a node's connection handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    InspectOn,
    InspectOff,
}

impl ControlCommand {
    pub fn inspect(on: bool) -> Self {
        if on { Self::InspectOn } else { Self::InspectOff }
    }

    /// Frame that carries this command to the node
    pub fn to_frame(self) -> Frame {
        match self {
            Self::InspectOn => Frame::inspect_on(),
            Self::InspectOff => Frame::inspect_off(),
        }
    }
}

#[derive(Debug)]
struct DeviceEntry {
    id: u64,
    peer: SocketAddr,
    registered_at: Instant,
    inspected: bool,
    documents: u64,
    control: mpsc::Sender<ControlCommand>,
}

/// Snapshot of one registered node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: String,
    pub peer: SocketAddr,
    /// Time since registration
    pub connected_for: Duration,
    pub inspected: bool,
    /// DATA frames received from this node
    pub documents: u64,
}

/// Manages all registered nodes
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: RwLock<HashMap<String, DeviceEntry>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name`, replacing any earlier registration under that name
    ///
    /// Returns the connection ID and the receiver for control commands.
    pub fn register(&self, name: &str, peer: SocketAddr) -> (u64, mpsc::Receiver<ControlCommand>) {
        let (control, receiver) = mpsc::channel(CONTROL_BUFFER_SIZE);
        let id = CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed);

        let entry = DeviceEntry {
            id,
            peer,
            registered_at: Instant::now(),
            inspected: false,
            documents: 0,
            control,
        };

        if let Some(previous) = self.devices.write().insert(name.to_string(), entry) {
            warn!(node = name, previous_peer = %previous.peer, %peer, "node re-registered, replacing");
        }

        (id, receiver)
    }

    /// Remove `name` if it is still registered under connection `id`
    pub fn unregister(&self, name: &str, id: u64) -> bool {
        let mut devices = self.devices.write();
        match devices.get(name) {
            Some(entry) if entry.id == id => {
                devices.remove(name);
                true
            }
            _ => false,
        }
    }

    /// Queue INSPECT_ON or INSPECT_OFF for `name`
    pub fn set_inspected(&self, name: &str, on: bool) -> Result<()> {
        let mut devices = self.devices.write();
        let entry = devices.get_mut(name).ok_or_else(|| TapError::NodeNotFound {
            node: name.to_string(),
        })?;

        entry
            .control
            .try_send(ControlCommand::inspect(on))
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => TapError::ChannelFull {
                    channel: format!("control:{name}"),
                },
                mpsc::error::TrySendError::Closed(_) => TapError::ChannelClosed {
                    channel: format!("control:{name}"),
                },
            })?;

        entry.inspected = on;
        debug!(node = name, inspected = on, "control queued");
        Ok(())
    }

    /// Queue the same command for every node
    ///
    /// Returns the number of nodes the command was queued for.
    pub fn set_all_inspected(&self, on: bool) -> usize {
        let mut devices = self.devices.write();
        let mut queued = 0;
        for (name, entry) in devices.iter_mut() {
            match entry.control.try_send(ControlCommand::inspect(on)) {
                Ok(()) => {
                    entry.inspected = on;
                    queued += 1;
                }
                Err(e) => debug!(node = %name, error = %e, "control not queued"),
            }
        }
        queued
    }

    /// Count a DATA frame from `name`
    pub fn record_document(&self, name: &str) {
        if let Some(entry) = self.devices.write().get_mut(name) {
            entry.documents += 1;
        }
    }

    pub fn get(&self, name: &str) -> Option<DeviceInfo> {
        self.devices.read().get(name).map(|entry| entry.info(name))
    }

    /// All registered nodes, sorted by name
    pub fn list(&self) -> Vec<DeviceInfo> {
        let mut devices: Vec<DeviceInfo> = self
            .devices
            .read()
            .iter()
            .map(|(name, entry)| entry.info(name))
            .collect();
        devices.sort_by(|a, b| a.name.cmp(&b.name));
        devices
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.devices.read().contains_key(name)
    }

    pub fn count(&self) -> usize {
        self.devices.read().len()
    }
}

impl DeviceEntry {
    fn info(&self, name: &str) -> DeviceInfo {
        DeviceInfo {
            name: name.to_string(),
            peer: self.peer,
            connected_for: self.registered_at.elapsed(),
            inspected: self.inspected,
            documents: self.documents,
        }
    }
}

#[cfg(test)]
#[path = "registry_test.rs"]
mod tests;
