//! Peripheral session management
//!
//! Tracks the single connection to the peripheral and guarantees nothing is
//! written outside a ready session

pub mod manager;
pub mod types;

pub use manager::{LINE_TERMINATOR, SessionManager, frame};
pub use types::{DisconnectOutcome, SessionState};
