//! USB serial transport
//!
//! A micro:bit exposes its UART over USB as a CDC serial port whose product
//! string starts with "BBC micro:bit". Discovery enumerates serial ports and
//! picks the first USB port whose product or manufacturer matches the filter
//! prefix (or the explicitly configured port). Port I/O is blocking, so every
//! call runs on the blocking pool. A poll task reports link loss when an open
//! device disappears from enumeration.

use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serialport::{SerialPort, SerialPortInfo, SerialPortType};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::{DeviceFilter, DeviceHandle, LINK_EVENT_CAPACITY, LinkEvent, Transport, WriteChannel};
use crate::{Error, Result};

/// Default baud rate of the micro:bit USB UART
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Write timeout so a wedged device cannot stall dispatch
const WRITE_TIMEOUT: Duration = Duration::from_millis(500);

/// Default interval between link checks
pub const DEFAULT_LINK_POLL: Duration = Duration::from_millis(1000);

/// Serial port parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialSettings {
    pub baud_rate: u32,
    pub write_timeout: Duration,
    pub link_poll: Duration,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            write_timeout: WRITE_TIMEOUT,
            link_poll: DEFAULT_LINK_POLL,
        }
    }
}

/// An open port; its own lock is held for the duration of a write
type SharedPort<P> = Arc<Mutex<P>>;

struct OpenPort<P> {
    device_id: String,
    port: SharedPort<P>,
}

/// Open ports by channel id. Only held for map edits, never during I/O.
type PortTable<P = Box<dyn SerialPort>> = Arc<Mutex<HashMap<String, OpenPort<P>>>>;

fn lock_ports<P>(ports: &PortTable<P>) -> MutexGuard<'_, HashMap<String, OpenPort<P>>> {
    ports.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Look up the port behind a channel
fn checkout<P>(ports: &PortTable<P>, channel_id: &str) -> Result<SharedPort<P>> {
    lock_ports(ports)
        .get(channel_id)
        .map(|open| Arc::clone(&open.port))
        .ok_or_else(|| Error::Transport(format!("channel {channel_id} is closed")))
}

/// Write one frame and flush, blocking until done or timed out
fn write_frame<P: Write>(port: &Mutex<P>, frame: &[u8]) -> Result<()> {
    let mut port = port.lock().unwrap_or_else(PoisonError::into_inner);
    port.write_all(frame)
        .and_then(|()| port.flush())
        .map_err(|e| Error::Transport(format!("serial write failed: {e}")))
}

/// Transport over a USB serial port
pub struct SerialTransport {
    settings: SerialSettings,
    ports: PortTable,
    events: broadcast::Sender<LinkEvent>,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl SerialTransport {
    /// Create a serial transport
    #[must_use]
    pub fn new(settings: SerialSettings) -> Self {
        let (events, _) = broadcast::channel(LINK_EVENT_CAPACITY);
        Self {
            settings,
            ports: Arc::new(Mutex::new(HashMap::new())),
            events,
            watcher: Mutex::new(None),
        }
    }

    /// List serial devices passing the filter
    ///
    /// # Errors
    ///
    /// Returns error if ports cannot be enumerated
    pub fn scan(filter: &DeviceFilter) -> Result<Vec<DeviceHandle>> {
        let ports = serialport::available_ports()?;
        Ok(select_devices(&ports, filter))
    }

    fn ensure_watcher(&self) {
        let mut watcher = self.watcher.lock().unwrap_or_else(PoisonError::into_inner);
        if watcher.as_ref().is_some_and(|w| !w.is_finished()) {
            return;
        }

        let ports = Arc::clone(&self.ports);
        let events = self.events.clone();
        let poll = self.settings.link_poll;

        *watcher = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poll);
            loop {
                ticker.tick().await;
                check_links(&ports, &events).await;
            }
        }));
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.watcher.lock()
            && let Some(handle) = guard.take()
        {
            handle.abort();
        }
    }
}

/// Drop ports whose device vanished and broadcast the loss
async fn check_links(ports: &PortTable, events: &broadcast::Sender<LinkEvent>) {
    let open: HashSet<String> = lock_ports(ports)
        .values()
        .map(|p| p.device_id.clone())
        .collect();
    if open.is_empty() {
        return;
    }

    let present = match tokio::task::spawn_blocking(serialport::available_ports).await {
        Ok(Ok(found)) => found
            .into_iter()
            .map(|p| p.port_name)
            .collect::<HashSet<_>>(),
        Ok(Err(e)) => {
            tracing::debug!(error = %e, "port enumeration failed during link check");
            return;
        }
        Err(e) => {
            tracing::debug!(error = %e, "link check task failed");
            return;
        }
    };

    for device_id in open.difference(&present) {
        lock_ports(ports).retain(|_, p| p.device_id != *device_id);
        tracing::warn!(device = %device_id, "serial device disappeared");
        let _ = events.send(LinkEvent::Lost {
            device_id: device_id.clone(),
        });
    }
}

/// Pick devices from an enumeration result
fn select_devices(ports: &[SerialPortInfo], filter: &DeviceFilter) -> Vec<DeviceHandle> {
    ports
        .iter()
        .filter_map(|info| {
            let name = device_name(info);
            let selected = filter.port.as_ref().map_or_else(
                || name.as_deref().is_some_and(|n| filter.matches_name(n)),
                |p| *p == info.port_name,
            );
            selected.then(|| DeviceHandle {
                id: info.port_name.clone(),
                name: name.unwrap_or_else(|| info.port_name.clone()),
            })
        })
        .collect()
}

/// USB product string, falling back to the manufacturer string
fn device_name(info: &SerialPortInfo) -> Option<String> {
    match &info.port_type {
        SerialPortType::UsbPort(usb) => usb.product.clone().or_else(|| usb.manufacturer.clone()),
        _ => None,
    }
}

fn join_error(e: &tokio::task::JoinError) -> Error {
    Error::Transport(format!("serial task failed: {e}"))
}

#[async_trait]
impl Transport for SerialTransport {
    fn name(&self) -> &'static str {
        "serial"
    }

    async fn discover(&self, filter: &DeviceFilter) -> Result<DeviceHandle> {
        let owned = filter.clone();
        let found = tokio::task::spawn_blocking(move || Self::scan(&owned))
            .await
            .map_err(|e| join_error(&e))??;

        let device = found.into_iter().next().ok_or_else(|| {
            Error::Transport(format!(
                "no serial device matching '{}'",
                filter.port.as_deref().unwrap_or(&filter.name_prefix)
            ))
        })?;

        tracing::debug!(device = %device.id, name = %device.name, "serial device discovered");
        Ok(device)
    }

    async fn open_write_channel(&self, device: &DeviceHandle) -> Result<WriteChannel> {
        let path = device.id.clone();
        let baud = self.settings.baud_rate;
        let timeout = self.settings.write_timeout;

        let port = tokio::task::spawn_blocking(move || -> Result<Box<dyn SerialPort>> {
            let mut port = serialport::new(&path, baud).timeout(timeout).open()?;
            if let Err(e) = port.write_data_terminal_ready(true) {
                tracing::debug!(error = %e, "failed to assert DTR");
            }
            Ok(port)
        })
        .await
        .map_err(|e| join_error(&e))??;

        let channel = WriteChannel {
            id: Uuid::new_v4().to_string(),
            device_id: device.id.clone(),
        };
        lock_ports(&self.ports).insert(
            channel.id.clone(),
            OpenPort {
                device_id: device.id.clone(),
                port: Arc::new(Mutex::new(port)),
            },
        );
        self.ensure_watcher();

        tracing::info!(device = %device.id, baud, "serial port opened");
        Ok(channel)
    }

    async fn write(&self, channel: &WriteChannel, bytes: &[u8]) -> Result<()> {
        let port = checkout(&self.ports, &channel.id)?;
        let frame = bytes.to_vec();

        tokio::task::spawn_blocking(move || write_frame(&port, &frame))
            .await
            .map_err(|e| join_error(&e))?
    }

    async fn close(&self, device: &DeviceHandle) {
        lock_ports(&self.ports).retain(|_, p| p.device_id != device.id);
        tracing::info!(device = %device.id, "serial port closed");
    }

    fn link_events(&self) -> broadcast::Receiver<LinkEvent> {
        self.events.subscribe()
    }
}
