//! Speech input feed
//!
//! Recognizers deliver utterances one at a time together with lifecycle
//! notifications. Lifecycle events are only logged.

mod lines;

pub use lines::LineRecognizer;

/// Event produced by a speech recognizer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognizerEvent {
    /// Recognition started
    Started,
    /// A final recognized utterance
    Utterance(String),
    /// Recognition stopped
    Stopped,
    /// Recognizer reported an error
    Error(String),
}

impl RecognizerEvent {
    /// Log a lifecycle event
    pub fn log(&self) {
        match self {
            Self::Started => tracing::info!("speech recognition started"),
            Self::Stopped => tracing::info!("speech recognition stopped"),
            Self::Error(e) => tracing::warn!(error = %e, "speech recognition error"),
            Self::Utterance(text) => tracing::debug!(utterance = %text, "recognized"),
        }
    }
}
