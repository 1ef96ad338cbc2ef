//! ResponseAccumulator: ordered chunks -> one response string

use tokio::sync::mpsc;
use tracing::warn;

use crate::types::{ErrorKind, StreamEvent};

/// Final state of an accumulated stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// Stream closed without error
    Completed(String),
    /// Stream reported an error; `partial` holds everything received
    Failed {
        partial: String,
        kind: ErrorKind,
        message: String,
    },
}

impl Completion {
    /// Accumulated text, complete or partial
    pub fn text(&self) -> &str {
        match self {
            Completion::Completed(text) => text,
            Completion::Failed { partial, .. } => partial,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Completion::Completed(_))
    }
}

/// Concatenates chunk text in arrival order
#[derive(Debug, Default)]
pub struct ResponseAccumulator {
    text: String,
    error: Option<(ErrorKind, String)>,
    chunks: usize,
}

impl ResponseAccumulator {
    /// Create new accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one event. Returns the completion once `Close` arrives.
    /// Only the first error is kept; chunks after it are still appended.
    pub fn push(&mut self, event: StreamEvent) -> Option<Completion> {
        match event {
            StreamEvent::Chunk(fragment) => {
                self.chunks += 1;
                self.text.push_str(&fragment);
                None
            }
            StreamEvent::Error { kind, message } => {
                if self.error.is_none() {
                    self.error = Some((kind, message));
                } else {
                    warn!("additional stream error ignored: {} {}", kind, message);
                }
                None
            }
            StreamEvent::Close => Some(self.finish()),
        }
    }

    /// Text so far
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Chunks received so far
    pub fn chunk_count(&self) -> usize {
        self.chunks
    }

    /// Current completion, as if the stream closed now
    pub fn finish(&self) -> Completion {
        match &self.error {
            None => Completion::Completed(self.text.clone()),
            Some((kind, message)) => Completion::Failed {
                partial: self.text.clone(),
                kind: *kind,
                message: message.clone(),
            },
        }
    }

    /// Consume a receiver until `Close`, calling `on_chunk` for each fragment.
    /// A sender that disappears without `Close` counts as a network failure.
    pub async fn drain<F>(mut rx: mpsc::Receiver<StreamEvent>, mut on_chunk: F) -> Completion
    where
        F: FnMut(&str),
    {
        let mut acc = Self::new();
        while let Some(event) = rx.recv().await {
            if let StreamEvent::Chunk(fragment) = &event {
                on_chunk(fragment);
            }
            if let Some(done) = acc.push(event) {
                return done;
            }
        }
        acc.push(StreamEvent::error(
            ErrorKind::Network,
            "stream ended without close",
        ));
        acc.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(s: &str) -> StreamEvent {
        StreamEvent::Chunk(s.to_string())
    }

    #[test]
    fn test_concatenates_in_order() {
        let mut acc = ResponseAccumulator::new();
        assert_eq!(acc.push(chunk("ab")), None);
        assert_eq!(acc.push(chunk("cd")), None);
        assert_eq!(
            acc.push(StreamEvent::Close),
            Some(Completion::Completed("abcd".into()))
        );
        assert_eq!(acc.chunk_count(), 2);
    }

    #[test]
    fn test_reordering_changes_result() {
        let mut a = ResponseAccumulator::new();
        a.push(chunk("x"));
        a.push(chunk("y"));
        let mut b = ResponseAccumulator::new();
        b.push(chunk("y"));
        b.push(chunk("x"));
        assert_ne!(a.finish(), b.finish());
    }

    #[test]
    fn test_error_keeps_partial_text() {
        let mut acc = ResponseAccumulator::new();
        acc.push(chunk("partial "));
        acc.push(StreamEvent::error(ErrorKind::Upstream, "boom"));
        acc.push(chunk("late"));
        let done = acc.push(StreamEvent::Close).unwrap();
        assert_eq!(
            done,
            Completion::Failed {
                partial: "partial late".into(),
                kind: ErrorKind::Upstream,
                message: "boom".into(),
            }
        );
        assert!(!done.is_completed());
        assert_eq!(done.text(), "partial late");
    }

    #[test]
    fn test_first_error_wins() {
        let mut acc = ResponseAccumulator::new();
        acc.push(StreamEvent::error(ErrorKind::Upstream, "first"));
        acc.push(StreamEvent::error(ErrorKind::Network, "second"));
        match acc.finish() {
            Completion::Failed { kind, message, .. } => {
                assert_eq!(kind, ErrorKind::Upstream);
                assert_eq!(message, "first");
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_drain_reports_live_chunks() {
        let (tx, rx) = mpsc::channel(8);
        tx.send(chunk("a")).await.unwrap();
        tx.send(chunk("b")).await.unwrap();
        tx.send(StreamEvent::Close).await.unwrap();

        let mut live = Vec::new();
        let done = ResponseAccumulator::drain(rx, |c| live.push(c.to_string())).await;
        assert_eq!(live, vec!["a", "b"]);
        assert_eq!(done, Completion::Completed("ab".into()));
    }

    #[tokio::test]
    async fn test_drain_without_close_is_network_failure() {
        let (tx, rx) = mpsc::channel(8);
        tx.send(chunk("a")).await.unwrap();
        drop(tx);
        let done = ResponseAccumulator::drain(rx, |_| {}).await;
        assert!(matches!(
            done,
            Completion::Failed { kind: ErrorKind::Network, .. }
        ));
        assert_eq!(done.text(), "a");
    }
}
