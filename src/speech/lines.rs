//! Line-oriented recognizer
//!
//! Treats each non-empty line of a reader as one final transcript. Pipe the
//! output of any external speech-to-text tool into stdin to drive the bridge.

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::LinesStream;

use super::RecognizerEvent;

/// Recognizer reading transcripts line by line
pub struct LineRecognizer<R> {
    reader: R,
}

impl<R> LineRecognizer<R>
where
    R: AsyncBufRead + Unpin,
{
    /// Wrap a buffered reader
    pub const fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Forward events until the reader ends or the receiver goes away
    pub async fn run(self, events: mpsc::Sender<RecognizerEvent>) {
        if events.send(RecognizerEvent::Started).await.is_err() {
            return;
        }

        let mut lines = LinesStream::new(self.reader.lines());
        while let Some(line) = lines.next().await {
            let event = match line {
                Ok(text) => {
                    let text = text.trim();
                    if text.is_empty() {
                        continue;
                    }
                    RecognizerEvent::Utterance(text.to_string())
                }
                Err(e) => {
                    let _ = events.send(RecognizerEvent::Error(e.to_string())).await;
                    break;
                }
            };
            if events.send(event).await.is_err() {
                return;
            }
        }

        let _ = events.send(RecognizerEvent::Stopped).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn emits_trimmed_utterances_between_lifecycle_events() {
        let input: &[u8] = b"  go forward please \n\n   \nstop\n";
        let (tx, mut rx) = mpsc::channel(8);

        LineRecognizer::new(input).run(tx).await;

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        assert_eq!(
            events,
            vec![
                RecognizerEvent::Started,
                RecognizerEvent::Utterance("go forward please".to_string()),
                RecognizerEvent::Utterance("stop".to_string()),
                RecognizerEvent::Stopped,
            ]
        );
    }

    #[tokio::test]
    async fn stops_when_receiver_dropped() {
        let input: &[u8] = b"left\nright\n";
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        LineRecognizer::new(input).run(tx).await;
    }
}
