//! Session state types

use std::fmt;

use serde::Serialize;

use crate::transport::DeviceHandle;

/// Connection state of the single peripheral session
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Disconnected,
    Connecting,
    Ready { device: DeviceHandle },
    Failed { reason: String },
}

impl SessionState {
    /// Whether payloads may be sent
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }

    /// The connected device, present only when ready
    #[must_use]
    pub const fn device(&self) -> Option<&DeviceHandle> {
        match self {
            Self::Ready { device } => Some(device),
            _ => None,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Ready { device } => write!(f, "Connected to {}", device.name),
            Self::Failed { reason } => write!(f, "Connection Failed: {reason}"),
        }
    }
}

/// What a disconnect request did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisconnectOutcome {
    /// A session (or pending connect) was torn down
    Disconnected,
    /// Nothing to do
    AlreadyDisconnected,
}

impl fmt::Display for DisconnectOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::AlreadyDisconnected => write!(f, "Already Disconnected"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_text() {
        let ready = SessionState::Ready {
            device: DeviceHandle {
                id: "/dev/ttyACM0".to_string(),
                name: "BBC micro:bit".to_string(),
            },
        };
        assert_eq!(ready.to_string(), "Connected to BBC micro:bit");
        assert_eq!(SessionState::default().to_string(), "Disconnected");
        assert_eq!(
            DisconnectOutcome::AlreadyDisconnected.to_string(),
            "Already Disconnected"
        );
    }

    #[test]
    fn serializes_tagged() {
        let failed = SessionState::Failed {
            reason: "no device".to_string(),
        };
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["state"], "failed");
        assert_eq!(json["reason"], "no device");

        let json = serde_json::to_value(SessionState::Connecting).unwrap();
        assert_eq!(json["state"], "connecting");
    }
}
