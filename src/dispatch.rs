//! Utterance dispatcher
//!
//! Resolves each recognized utterance and forwards the payload to the
//! session. Nothing is retried.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::{Error, Result};
use crate::commands::{SharedVocabulary, resolve};
use crate::session::SessionManager;

/// Pending utterances allowed before submitters wait
const QUEUE_CAPACITY: usize = 32;

/// Outcome of dispatching one utterance
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum DispatchResult {
    /// Payload was written to the peripheral
    Sent(String),
    /// Nothing in the vocabulary matched the utterance
    NoMatch(String),
    /// A payload matched but could not be sent
    Rejected(String),
}

impl fmt::Display for DispatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sent(payload) => write!(f, "sent {payload}"),
            Self::NoMatch(utterance) => write!(f, "no match for \"{utterance}\""),
            Self::Rejected(reason) => write!(f, "rejected: {reason}"),
        }
    }
}

/// The latest dispatch, kept for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchRecord {
    pub utterance: String,
    pub result: DispatchResult,
    pub at: DateTime<Utc>,
}

/// Glue between recognized speech and the session
pub struct Dispatcher {
    vocabulary: SharedVocabulary,
    session: Arc<SessionManager>,
    last: Mutex<Option<DispatchRecord>>,
}

impl Dispatcher {
    /// Create a dispatcher over a vocabulary and session
    #[must_use]
    pub const fn new(vocabulary: SharedVocabulary, session: Arc<SessionManager>) -> Self {
        Self {
            vocabulary,
            session,
            last: Mutex::new(None),
        }
    }

    /// Handle one recognized utterance
    pub async fn on_utterance(&self, raw: &str) -> DispatchResult {
        let resolution = {
            let vocabulary = self.vocabulary.read().await;
            resolve(&vocabulary, raw)
        };

        let result = match resolution {
            None => {
                tracing::info!(utterance = raw, "unknown command");
                DispatchResult::NoMatch(raw.to_string())
            }
            Some(resolution) => match self.session.send(&resolution.payload).await {
                Ok(()) => {
                    tracing::info!(
                        utterance = raw,
                        payload = %resolution.payload,
                        source = ?resolution.source,
                        "command sent"
                    );
                    DispatchResult::Sent(resolution.payload)
                }
                Err(Error::NotConnected) => {
                    tracing::warn!(payload = %resolution.payload, "cannot send, not connected");
                    DispatchResult::Rejected("not connected".to_string())
                }
                Err(e) => DispatchResult::Rejected(e.to_string()),
            },
        };

        *self.last.lock().unwrap_or_else(PoisonError::into_inner) = Some(DispatchRecord {
            utterance: raw.to_string(),
            result: result.clone(),
            at: Utc::now(),
        });

        result
    }

    /// Most recent dispatch, if any
    #[must_use]
    pub fn last_result(&self) -> Option<DispatchRecord> {
        self.last
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Vocabulary used for resolution
    #[must_use]
    pub const fn vocabulary(&self) -> &SharedVocabulary {
        &self.vocabulary
    }

    /// Session payloads are sent through
    #[must_use]
    pub const fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }
}

struct QueuedUtterance {
    text: String,
    reply: Option<oneshot::Sender<DispatchResult>>,
}

/// Serializes utterances from every source into one dispatcher
///
/// Utterances are handled one at a time in arrival order.
#[derive(Clone)]
pub struct DispatchQueue {
    tx: mpsc::Sender<QueuedUtterance>,
}

impl DispatchQueue {
    /// Start the dispatch loop
    ///
    /// The loop ends once every queue handle is dropped.
    #[must_use]
    pub fn spawn(dispatcher: Arc<Dispatcher>) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<QueuedUtterance>(QUEUE_CAPACITY);

        let handle = tokio::spawn(async move {
            while let Some(queued) = rx.recv().await {
                let result = dispatcher.on_utterance(&queued.text).await;
                if let Some(reply) = queued.reply {
                    let _ = reply.send(result);
                }
            }
            tracing::debug!("dispatch queue closed");
        });

        (Self { tx }, handle)
    }

    /// Queue an utterance and wait for its result
    ///
    /// # Errors
    ///
    /// Returns error if the dispatch loop has stopped
    pub async fn submit(&self, text: impl Into<String>) -> Result<DispatchResult> {
        let (reply, rx) = oneshot::channel();
        self.enqueue(text.into(), Some(reply)).await?;
        rx.await.map_err(|_| Error::DispatchStopped)
    }

    /// Queue an utterance without waiting for the result
    ///
    /// # Errors
    ///
    /// Returns error if the dispatch loop has stopped
    pub async fn push(&self, text: impl Into<String>) -> Result<()> {
        self.enqueue(text.into(), None).await
    }

    async fn enqueue(
        &self,
        text: String,
        reply: Option<oneshot::Sender<DispatchResult>>,
    ) -> Result<()> {
        self.tx
            .send(QueuedUtterance { text, reply })
            .await
            .map_err(|_| Error::DispatchStopped)
    }
}
