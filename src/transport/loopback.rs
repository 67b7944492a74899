//! In-memory transport
//!
//! Records every frame instead of talking to hardware. Used by `--loopback`
//! runs and by tests, which can script discovery results, hold discovery
//! open, fail writes and simulate link loss.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::{Notify, broadcast};
use uuid::Uuid;

use super::{DeviceFilter, DeviceHandle, LINK_EVENT_CAPACITY, LinkEvent, Transport, WriteChannel};
use crate::{Error, Result};

/// Scripted result of the next discovery
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryOutcome {
    /// A device is present
    Found(DeviceHandle),
    /// Discovery fails with the given reason
    Fail(String),
}

#[derive(Debug)]
struct LoopbackState {
    discovery: DiscoveryOutcome,
    channels: HashMap<String, String>,
    frames: Vec<Vec<u8>>,
    write_calls: usize,
    discover_calls: usize,
    write_failure: Option<String>,
    closed: Vec<String>,
}

/// Transport that keeps everything in memory
#[derive(Debug)]
pub struct LoopbackTransport {
    state: Mutex<LoopbackState>,
    gated: AtomicBool,
    gate: Notify,
    events: broadcast::Sender<LinkEvent>,
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackTransport {
    /// Create a transport with one discoverable device
    #[must_use]
    pub fn new() -> Self {
        Self::with_discovery(DiscoveryOutcome::Found(Self::default_device()))
    }

    /// Create a transport with a scripted discovery outcome
    #[must_use]
    pub fn with_discovery(discovery: DiscoveryOutcome) -> Self {
        let (events, _) = broadcast::channel(LINK_EVENT_CAPACITY);
        Self {
            state: Mutex::new(LoopbackState {
                discovery,
                channels: HashMap::new(),
                frames: Vec::new(),
                write_calls: 0,
                discover_calls: 0,
                write_failure: None,
                closed: Vec::new(),
            }),
            gated: AtomicBool::new(false),
            gate: Notify::new(),
            events,
        }
    }

    /// The device the default loopback transport discovers
    #[must_use]
    pub fn default_device() -> DeviceHandle {
        DeviceHandle {
            id: "loopback-0".to_string(),
            name: "BBC micro:bit (loopback)".to_string(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LoopbackState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Change the outcome of subsequent discoveries
    pub fn set_discovery(&self, discovery: DiscoveryOutcome) {
        self.lock().discovery = discovery;
    }

    /// Make discoveries wait until `release_discovery` is called
    pub fn hold_discovery(&self) {
        self.gated.store(true, Ordering::SeqCst);
    }

    /// Let one held discovery proceed
    pub fn release_discovery(&self) {
        self.gate.notify_one();
    }

    /// Fail every write with `reason`, or clear with `None`
    pub fn set_write_failure(&self, reason: Option<String>) {
        self.lock().write_failure = reason;
    }

    /// Report the link to `device_id` as lost
    pub fn simulate_link_loss(&self, device_id: &str) {
        self.lock().channels.retain(|_, dev| dev != device_id);
        let _ = self.events.send(LinkEvent::Lost {
            device_id: device_id.to_string(),
        });
    }

    /// Frames accepted so far
    #[must_use]
    pub fn frames(&self) -> Vec<Vec<u8>> {
        self.lock().frames.clone()
    }

    /// Number of write attempts, including failed ones
    #[must_use]
    pub fn write_calls(&self) -> usize {
        self.lock().write_calls
    }

    /// Number of discovery attempts
    #[must_use]
    pub fn discover_calls(&self) -> usize {
        self.lock().discover_calls
    }

    /// Device ids passed to `close`, in order
    #[must_use]
    pub fn closed_devices(&self) -> Vec<String> {
        self.lock().closed.clone()
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    fn name(&self) -> &'static str {
        "loopback"
    }

    async fn discover(&self, filter: &DeviceFilter) -> Result<DeviceHandle> {
        self.lock().discover_calls += 1;

        if self.gated.load(Ordering::SeqCst) {
            self.gate.notified().await;
        }

        let discovery = self.lock().discovery.clone();
        match discovery {
            DiscoveryOutcome::Found(device) => {
                let selected = filter
                    .port
                    .as_ref()
                    .map_or_else(|| filter.matches_name(&device.name), |p| *p == device.id);
                if selected {
                    Ok(device)
                } else {
                    Err(Error::Transport(format!(
                        "no device matching '{}'",
                        filter.port.as_deref().unwrap_or(&filter.name_prefix)
                    )))
                }
            }
            DiscoveryOutcome::Fail(reason) => Err(Error::Transport(reason)),
        }
    }

    async fn open_write_channel(&self, device: &DeviceHandle) -> Result<WriteChannel> {
        let channel = WriteChannel {
            id: Uuid::new_v4().to_string(),
            device_id: device.id.clone(),
        };
        self.lock()
            .channels
            .insert(channel.id.clone(), device.id.clone());
        Ok(channel)
    }

    async fn write(&self, channel: &WriteChannel, bytes: &[u8]) -> Result<()> {
        let mut state = self.lock();
        state.write_calls += 1;

        if let Some(reason) = &state.write_failure {
            return Err(Error::Transport(reason.clone()));
        }
        if !state.channels.contains_key(&channel.id) {
            return Err(Error::Transport(format!("channel {} is closed", channel.id)));
        }

        state.frames.push(bytes.to_vec());
        tracing::trace!(device = %channel.device_id, bytes = bytes.len(), "loopback write");
        Ok(())
    }

    async fn close(&self, device: &DeviceHandle) {
        let mut state = self.lock();
        state.channels.retain(|_, dev| *dev != device.id);
        state.closed.push(device.id.clone());
    }

    fn link_events(&self) -> broadcast::Receiver<LinkEvent> {
        self.events.subscribe()
    }
}
