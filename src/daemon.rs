//! Daemon - the main remote service
//!
//! Wires speech input, the dispatch queue, the peripheral session and the
//! HTTP API together and runs until interrupted.

use std::future::Future;
use std::sync::Arc;

use tokio::io::{AsyncBufRead, BufReader};
use tokio::sync::mpsc;

use crate::api::{ApiServer, ApiState};
use crate::commands::Vocabulary;
use crate::dispatch::{DispatchQueue, Dispatcher};
use crate::session::SessionManager;
use crate::speech::{LineRecognizer, RecognizerEvent};
use crate::transport::Transport;
use crate::{Config, Result};

/// Recognizer events buffered ahead of the dispatch loop
const EVENT_BUFFER: usize = 32;

/// The Beacon Remote daemon
pub struct Daemon {
    config: Config,
    transport: Arc<dyn Transport>,
    vocabulary: Vocabulary,
}

impl Daemon {
    /// Create a new daemon instance
    ///
    /// # Errors
    ///
    /// Returns error if the configured command table or overrides are invalid
    pub fn new(config: Config, transport: Arc<dyn Transport>) -> Result<Self> {
        let vocabulary = config.build_vocabulary()?;
        tracing::debug!(
            builtins = vocabulary.builtins().len(),
            overrides = vocabulary.overrides().len(),
            "vocabulary loaded"
        );

        Ok(Self {
            config,
            transport,
            vocabulary,
        })
    }

    /// Run the daemon on stdin until ctrl-c
    ///
    /// # Errors
    ///
    /// Returns error if the daemon encounters a fatal error
    pub async fn run(self) -> Result<()> {
        let shutdown = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        };

        self.run_with_input(BufReader::new(tokio::io::stdin()), shutdown)
            .await
    }

    /// Run the daemon reading utterances from `input`
    ///
    /// Returns when `shutdown` resolves. With the API disabled it also
    /// returns once `input` ends, after every queued utterance is handled.
    ///
    /// # Errors
    ///
    /// Returns error if the daemon encounters a fatal error
    pub async fn run_with_input<R>(
        self,
        input: R,
        shutdown: impl Future<Output = ()>,
    ) -> Result<()>
    where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        tracing::info!(
            transport = self.transport.name(),
            prefix = %self.config.device.filter.name_prefix,
            "daemon running"
        );

        let session = Arc::new(SessionManager::new(
            self.transport,
            self.config.device.filter.clone(),
        ));
        let link_watch = session.watch_link_loss();

        let dispatcher = Arc::new(Dispatcher::new(
            self.vocabulary.into_shared(),
            Arc::clone(&session),
        ));
        let (queue, dispatch_loop) = DispatchQueue::spawn(Arc::clone(&dispatcher));

        let api_handle = if self.config.api_server.enabled {
            let state = Arc::new(ApiState::new(Arc::clone(&dispatcher), queue.clone()));
            Some(ApiServer::new(state, self.config.api_server.port).spawn())
        } else {
            tracing::info!("API server disabled");
            None
        };

        if self.config.device.auto_connect {
            match session.connect().await {
                Ok(state) => tracing::info!(status = %state, "auto-connect finished"),
                Err(e) => tracing::warn!(error = %e, "auto-connect failed"),
            }
        }

        let (event_tx, mut events) = mpsc::channel(EVENT_BUFFER);
        let recognizer = tokio::spawn(LineRecognizer::new(input).run(event_tx));
        let mut speech_open = true;

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                () = &mut shutdown => {
                    tracing::info!("shutdown requested");
                    break;
                }
                event = events.recv(), if speech_open => match event {
                    Some(RecognizerEvent::Utterance(text)) => {
                        if let Err(e) = queue.push(text).await {
                            tracing::error!(error = %e, "dispatch queue unavailable");
                            break;
                        }
                    }
                    Some(other) => other.log(),
                    None => {
                        speech_open = false;
                        if api_handle.is_none() {
                            tracing::info!("speech input ended");
                            break;
                        }
                        tracing::info!("speech input ended, still serving API");
                    }
                },
            }
        }

        recognizer.abort();
        if let Some(handle) = api_handle {
            handle.abort();
            let _ = handle.await;
        }

        drop(queue);
        let _ = dispatch_loop.await;

        let outcome = session.disconnect().await;
        tracing::info!(%outcome, "session closed");
        link_watch.abort();

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::LoopbackTransport;

    fn offline_config(auto_connect: bool) -> Config {
        let mut config = Config::default();
        config.api_server.enabled = false;
        config.device.auto_connect = auto_connect;
        config
    }

    #[tokio::test]
    async fn drains_input_then_disconnects() {
        let transport = Arc::new(LoopbackTransport::new());
        let daemon = Daemon::new(offline_config(true), transport.clone()).unwrap();
        let input: &'static [u8] = b"okay go forward please\nwhat's the weather\nhalt\n";

        daemon
            .run_with_input(input, std::future::pending::<()>())
            .await
            .unwrap();

        assert_eq!(
            transport.frames(),
            vec![b"forward\n".to_vec(), b"stop\n".to_vec()]
        );
        assert_eq!(transport.closed_devices(), vec!["loopback-0".to_string()]);
    }

    #[tokio::test]
    async fn without_connect_nothing_is_written() {
        let transport = Arc::new(LoopbackTransport::new());
        let daemon = Daemon::new(offline_config(false), transport.clone()).unwrap();
        let input: &'static [u8] = b"go forward\n";

        daemon
            .run_with_input(input, std::future::pending::<()>())
            .await
            .unwrap();

        assert_eq!(transport.write_calls(), 0);
        assert_eq!(transport.discover_calls(), 0);
    }

    #[test]
    fn rejects_invalid_startup_override() {
        let mut config = offline_config(false);
        config.overrides.push(crate::commands::UserOverride {
            trigger: "dance".to_string(),
            payload: "  ".to_string(),
        });

        let result = Daemon::new(config, Arc::new(LoopbackTransport::new()));
        assert!(result.is_err());
    }
}
