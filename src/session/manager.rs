//! Peripheral session manager
//!
//! Owns the only `SessionState` in the process. State is guarded by a
//! short-lived mutex that is never held across an await; transport calls
//! happen outside it.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use super::types::{DisconnectOutcome, SessionState};
use crate::transport::{DeviceFilter, DeviceHandle, LinkEvent, Transport, WriteChannel};
use crate::{Error, Result};

/// Terminator appended to every payload on the wire
pub const LINE_TERMINATOR: u8 = b'\n';

/// Encode a payload as one wire frame
#[must_use]
pub fn frame(payload: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(payload.len() + 1);
    bytes.extend_from_slice(payload.as_bytes());
    bytes.push(LINE_TERMINATOR);
    bytes
}

#[derive(Debug, Default)]
struct Inner {
    state: SessionState,
    channel: Option<WriteChannel>,
    connect_in_flight: bool,
}

/// Lifecycle of the single peripheral connection
pub struct SessionManager {
    transport: Arc<dyn Transport>,
    filter: DeviceFilter,
    inner: Mutex<Inner>,
}

/// Clears the in-flight flag even if the connect future is dropped
struct InFlight<'a> {
    manager: &'a SessionManager,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut inner = self.manager.lock();
        inner.connect_in_flight = false;
        if inner.state == SessionState::Connecting {
            tracing::warn!("connect abandoned before completion");
            inner.state = SessionState::Failed {
                reason: "connect cancelled".to_string(),
            };
        }
    }
}

impl SessionManager {
    /// Create a manager in the `Disconnected` state
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, filter: DeviceFilter) -> Self {
        Self {
            transport,
            filter,
            inner: Mutex::new(Inner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current state snapshot
    #[must_use]
    pub fn status(&self) -> SessionState {
        self.lock().state.clone()
    }

    /// Filter used for discovery
    #[must_use]
    pub const fn filter(&self) -> &DeviceFilter {
        &self.filter
    }

    /// Discover and connect to the peripheral
    ///
    /// Returns the state once the attempt settles. If `disconnect` was
    /// called while connecting, a late success is closed again and the
    /// session stays `Disconnected`.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyInProgress` if a connect is running, or the transport
    /// error when discovery or channel setup fails (state becomes `Failed`)
    pub async fn connect(&self) -> Result<SessionState> {
        {
            let mut inner = self.lock();
            if inner.connect_in_flight {
                return Err(Error::AlreadyInProgress);
            }
            if inner.state.is_ready() {
                tracing::debug!("connect requested while already connected");
                return Ok(inner.state.clone());
            }
            inner.connect_in_flight = true;
            inner.state = SessionState::Connecting;
        }
        let _in_flight = InFlight { manager: self };

        tracing::info!(
            transport = self.transport.name(),
            prefix = %self.filter.name_prefix,
            port = ?self.filter.port,
            "connecting to peripheral"
        );

        let outcome = self.establish().await;

        // Checked and applied under one guard: a concurrent disconnect lands
        // either before the transition or after `Ready` is set.
        let late = {
            let mut inner = self.lock();
            if inner.state == SessionState::Connecting {
                return match outcome {
                    Ok((device, channel)) => {
                        tracing::info!(device = %device.id, name = %device.name, "session ready");
                        inner.state = SessionState::Ready { device };
                        inner.channel = Some(channel);
                        Ok(inner.state.clone())
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "connection failed");
                        inner.state = SessionState::Failed {
                            reason: e.to_string(),
                        };
                        Err(e)
                    }
                };
            }
            outcome
        };

        match late {
            Ok((device, _)) => {
                tracing::info!(
                    device = %device.id,
                    "disconnected while connecting, closing device"
                );
                self.transport.close(&device).await;
            }
            Err(e) => {
                tracing::debug!(error = %e, "connect failed after disconnect, ignoring");
            }
        }
        Ok(SessionState::Disconnected)
    }

    async fn establish(&self) -> Result<(DeviceHandle, WriteChannel)> {
        let device = self.transport.discover(&self.filter).await?;
        match self.transport.open_write_channel(&device).await {
            Ok(channel) => Ok((device, channel)),
            Err(e) => {
                self.transport.close(&device).await;
                Err(e)
            }
        }
    }

    /// Tear down the session; always ends `Disconnected`
    pub async fn disconnect(&self) -> DisconnectOutcome {
        let (previous, _) = {
            let mut inner = self.lock();
            let channel = inner.channel.take();
            (std::mem::take(&mut inner.state), channel)
        };

        match previous {
            SessionState::Disconnected => {
                tracing::debug!("already disconnected");
                DisconnectOutcome::AlreadyDisconnected
            }
            SessionState::Ready { device } => {
                self.transport.close(&device).await;
                tracing::info!(device = %device.id, "disconnected");
                DisconnectOutcome::Disconnected
            }
            SessionState::Connecting => {
                tracing::info!("disconnect requested while connecting");
                DisconnectOutcome::Disconnected
            }
            SessionState::Failed { .. } => {
                tracing::debug!("cleared failed session");
                DisconnectOutcome::Disconnected
            }
        }
    }

    /// Send one payload to the peripheral
    ///
    /// A write failure leaves the session as it is; only a link-loss
    /// notification ends it.
    ///
    /// # Errors
    ///
    /// Returns `NotConnected` without touching the transport unless the
    /// session is ready, or the transport error if the write fails
    pub async fn send(&self, payload: &str) -> Result<()> {
        let channel = {
            let inner = self.lock();
            match (&inner.state, &inner.channel) {
                (SessionState::Ready { .. }, Some(channel)) => channel.clone(),
                _ => return Err(Error::NotConnected),
            }
        };

        match self.transport.write(&channel, &frame(payload)).await {
            Ok(()) => {
                tracing::debug!(device = %channel.device_id, payload, "payload sent");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(device = %channel.device_id, payload, error = %e, "write failed");
                Err(e)
            }
        }
    }

    /// Apply a link-loss notification
    ///
    /// Returns true if the current session ended. Notifications for any
    /// other device are ignored.
    pub fn handle_link_lost(&self, device_id: &str) -> bool {
        let mut inner = self.lock();
        if inner.state.device().is_some_and(|d| d.id == device_id) {
            inner.state = SessionState::Disconnected;
            inner.channel = None;
            tracing::warn!(device = %device_id, "{}", Error::LinkLost(device_id.to_string()));
            true
        } else {
            tracing::debug!(device = %device_id, "ignoring link loss for inactive device");
            false
        }
    }

    /// Apply the transport's link events until the manager is dropped
    pub fn watch_link_loss(self: &Arc<Self>) -> JoinHandle<()> {
        let mut events = self.transport.link_events();
        let manager: Weak<Self> = Arc::downgrade(self);

        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(LinkEvent::Lost { device_id }) => {
                        let Some(manager) = manager.upgrade() else {
                            break;
                        };
                        manager.handle_link_lost(&device_id);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "link events lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}
