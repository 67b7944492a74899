//! Peripheral transports
//!
//! Each transport implements the `Transport` trait: discovery, opening a
//! write channel, writing frames and reporting link loss. The session
//! manager is the only caller.

mod loopback;
mod serial;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

pub use loopback::{DiscoveryOutcome, LoopbackTransport};
pub use serial::{SerialSettings, SerialTransport};

use crate::Result;

/// Default device name prefix (micro:bit USB interface)
pub const DEFAULT_NAME_PREFIX: &str = "BBC micro:bit";

/// Capacity of link event broadcast channels
pub(crate) const LINK_EVENT_CAPACITY: usize = 16;

/// Criteria used to pick a peripheral during discovery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceFilter {
    /// Device name must start with this prefix
    pub name_prefix: String,
    /// Explicit port or address, bypassing the prefix match
    pub port: Option<String>,
}

impl Default for DeviceFilter {
    fn default() -> Self {
        Self {
            name_prefix: DEFAULT_NAME_PREFIX.to_string(),
            port: None,
        }
    }
}

impl DeviceFilter {
    /// Whether a device name passes the prefix filter
    #[must_use]
    pub fn matches_name(&self, name: &str) -> bool {
        name.starts_with(&self.name_prefix)
    }
}

/// A discovered peripheral
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceHandle {
    /// Transport-specific identifier (port path, address)
    pub id: String,
    /// Human-readable name
    pub name: String,
}

/// An open write path to a peripheral
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteChannel {
    /// Channel identifier assigned by the transport
    pub id: String,
    /// Device the channel writes to
    pub device_id: String,
}

/// Asynchronous notification from a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// The link to the device went away
    Lost { device_id: String },
}

/// Link to a single peripheral
#[async_trait]
pub trait Transport: Send + Sync {
    /// Transport name for logging
    fn name(&self) -> &'static str;

    /// Find a device matching the filter
    async fn discover(&self, filter: &DeviceFilter) -> Result<DeviceHandle>;

    /// Open a write channel to a discovered device
    async fn open_write_channel(&self, device: &DeviceHandle) -> Result<WriteChannel>;

    /// Write one frame, returning once the write is accepted
    async fn write(&self, channel: &WriteChannel, bytes: &[u8]) -> Result<()>;

    /// Release a device and any channels open to it
    async fn close(&self, device: &DeviceHandle);

    /// Subscribe to link events
    fn link_events(&self) -> broadcast::Receiver<LinkEvent>;
}
