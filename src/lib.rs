//! Beacon Remote - voice control bridge for micro:bit robots
//!
//! This library provides the core functionality for the remote:
//! - Command vocabulary (built-in phrases plus user overrides)
//! - Utterance resolution and dispatch
//! - Peripheral session management over a pluggable transport
//! - HTTP API for status, vocabulary edits and manual dispatch
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                      Inputs                          │
//! │      Speech (stdin lines)   │   HTTP API             │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                 Beacon Remote                        │
//! │  Dispatch queue  │  Resolver  │  Session manager    │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                    Transport                         │
//! │        USB serial   │   Loopback                     │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod commands;
pub mod config;
pub mod daemon;
pub mod dispatch;
pub mod error;
pub mod session;
pub mod speech;
pub mod transport;

pub use commands::{CommandEntry, Resolution, SharedVocabulary, UserOverride, Vocabulary};
pub use config::Config;
pub use daemon::Daemon;
pub use dispatch::{DispatchQueue, DispatchRecord, DispatchResult, Dispatcher};
pub use error::{Error, Result};
pub use session::{DisconnectOutcome, SessionManager, SessionState};
pub use transport::{DeviceFilter, DeviceHandle, LoopbackTransport, SerialTransport, Transport};
